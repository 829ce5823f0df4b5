// Credential and session core of an account service
mod modules;

// Re-export everything from modules for easier access
pub use modules::{auth, config, email, utils};

// Re-export commonly used types
pub use modules::auth::{
    AuthError, AuthService, AuthSession, InMemoryUserStore, JsonFileUserStore, OneTimeCodeStore,
    PasswordHasher, PublicUser, TokenService, User, UserStore,
};
pub use modules::config::ServiceConfig;
pub use modules::email::{LogMailer, Mailer, SmtpMailer};

// Constants
pub const USERS_FILE: &str = "users.json";

// Type aliases
pub type HmacSha256 = hmac::Hmac<sha2::Sha256>;
