pub mod codes;
pub mod error;
pub mod password;
pub mod requests;
pub mod service;
pub mod store;
pub mod tokens;
pub mod user_interface;
pub mod verification;

// Re-export the main types and functions
pub use codes::{generate_code, OneTimeCodeStore, PendingCode};
pub use error::{AuthError, FieldError};
pub use password::{validate_password, PasswordError, PasswordHasher};
pub use requests::{LoginRequest, RegisterRequest, ResetPasswordRequest};
pub use service::{AuthService, AuthSession};
pub use store::{InMemoryUserStore, JsonFileUserStore, NewUser, PublicUser, StoreError, User, UserStore};
pub use tokens::{Claims, TokenConfig, TokenService};
pub use user_interface::{parse_command, Shell, ShellCommand};
pub use verification::build_verification_url;
