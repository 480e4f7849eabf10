//! # Server-side authentication
//!
//! Login is a two-round challenge-response:
//!
//! 1. `Auth { username, "" }` asks for the user's salt. The server answers
//!    `(Auth, SuccessWithSalt)` with the stored salt, or `(Auth, Failed)`
//!    with `"not registered"`.
//! 2. `Auth { username, hash }` carries `hex(SHA256(password || salt))`,
//!    which is compared with the stored hash.
//!
//! Registration is a single round. The password only ever exists on the
//! server long enough to be hashed with a fresh salt.

use crate::core::packet::{Auth, Register, ServerResponse};
use crate::error::{constants, Result};
use crate::protocol::dispatcher::{HandlerContext, Handling, PacketHandler};
use crate::protocol::session::AuthPhase;
use crate::store::{UserRecord, UserStore};
use crate::utils::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::utils::security::{generate_salt, hash_password, hashes_match, DEFAULT_SALT_LENGTH};
use std::sync::Arc;
use tracing::warn;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    salt_length: usize,
    diagnostics: Arc<dyn Diagnostics>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            users,
            salt_length: DEFAULT_SALT_LENGTH,
            diagnostics,
        }
    }

    pub fn with_salt_length(mut self, salt_length: usize) -> Self {
        self.salt_length = salt_length;
        self
    }

    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    /// Store failures count as "not found".
    fn lookup(&self, username: &str) -> Option<UserRecord> {
        match self.users.get_user_record(username) {
            Ok(record) => record,
            Err(error) => {
                warn!(username, error = %error, "User lookup failed");
                None
            }
        }
    }

    fn reject(&self, ctx: &mut HandlerContext<'_>, username: &str, reason: &str) {
        ctx.auth.reset();
        ctx.outbox.reply(ServerResponse::auth_failed(reason));
        self.diagnostics
            .emit(DiagnosticEvent::AuthFailed { username, reason });
    }

    fn issue_salt(&self, ctx: &mut HandlerContext<'_>, username: &str) {
        match self.lookup(username) {
            Some(record) => {
                ctx.auth.salt_issued(username);
                ctx.outbox.reply(ServerResponse::auth_salt(record.salt));
                self.diagnostics
                    .emit(DiagnosticEvent::SaltIssued { username });
            }
            None => self.reject(ctx, username, constants::MSG_NOT_REGISTERED),
        }
    }

    fn verify_hash(&self, ctx: &mut HandlerContext<'_>, username: &str, hash: &str) {
        let Some(record) = self.lookup(username) else {
            self.reject(ctx, username, constants::MSG_NOT_REGISTERED);
            return;
        };

        if !hashes_match(&record.password_hash, hash) {
            self.reject(ctx, username, constants::MSG_WRONG_PASSWORD);
            return;
        }

        ctx.auth.authenticate();
        ctx.outbox.reply(ServerResponse::auth_success());
        self.diagnostics
            .emit(DiagnosticEvent::AuthSucceeded { username });
    }
}

impl PacketHandler for AuthService {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn on_auth(&self, ctx: &mut HandlerContext<'_>, packet: &Auth) -> Result<Handling> {
        let pending = match ctx.auth.phase() {
            AuthPhase::SaltIssued if !packet.is_salt_request() => {
                ctx.auth.pending_username().map(str::to_owned)
            }
            _ => None,
        };

        match pending {
            // The hash is checked against the user the salt was issued for,
            // whatever name the packet carries.
            Some(username) => self.verify_hash(ctx, &username, &packet.password),
            None => self.issue_salt(ctx, &packet.username),
        }
        Ok(Handling::Handled)
    }

    fn on_register(&self, ctx: &mut HandlerContext<'_>, packet: &Register) -> Result<Handling> {
        let username = packet.username.as_str();
        let salt = generate_salt(self.salt_length);
        let hash = hash_password(&packet.password, &salt);

        let created = self.users.create_user(
            username,
            &packet.first_name,
            &packet.last_name,
            &hash,
            &salt,
        );

        let reason = match created {
            Ok(true) => {
                ctx.outbox.reply(ServerResponse::register_success());
                self.diagnostics
                    .emit(DiagnosticEvent::Registered { username });
                return Ok(Handling::Handled);
            }
            Ok(false) => constants::MSG_USERNAME_TAKEN,
            Err(error) => {
                warn!(username, error = %error, "User creation failed");
                constants::MSG_REGISTRATION_FAILED
            }
        };

        ctx.outbox.reply(ServerResponse::register_failed(reason));
        self.diagnostics
            .emit(DiagnosticEvent::RegistrationRejected { username, reason });
        Ok(Handling::Handled)
    }
}
