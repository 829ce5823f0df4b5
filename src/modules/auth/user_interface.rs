use std::io;

use super::error::AuthError;
use super::requests::{LoginRequest, RegisterRequest, ResetPasswordRequest};
use super::service::{AuthService, AuthSession};
use super::store::UserStore;
use crate::modules::email::mailer::Mailer;
use crate::modules::utils::io::{prompt, split_words};
use crate::modules::utils::time::format_timestamp;

/// One line typed at the shell prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Register {
        username: String,
        password: Option<String>,
        full_name: String,
        email: String,
    },
    Login {
        username: String,
        password: Option<String>,
    },
    Whoami,
    SendVerification,
    Verify {
        token: String,
    },
    Forgot {
        username: String,
    },
    Reset {
        username: String,
        code: String,
        password: Option<String>,
    },
    Logout,
    Help,
    Exit,
}

/// Parse a shell line. Passwords may be left out and are then prompted for.
pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let words = split_words(line);
    let Some((name, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };

    let arg = |i: usize| args.get(i).cloned();
    let usage = |text: &str| Err(format!("usage: {}", text));

    match (name.to_lowercase().as_str(), args.len()) {
        ("register", 3) => Ok(ShellCommand::Register {
            username: args[0].clone(),
            password: None,
            full_name: args[1].clone(),
            email: args[2].clone(),
        }),
        ("register", 4) => Ok(ShellCommand::Register {
            username: args[0].clone(),
            password: arg(1),
            full_name: args[2].clone(),
            email: args[3].clone(),
        }),
        ("register", _) => usage("register <username> [password] \"<full name>\" <email>"),
        ("login", 1 | 2) => Ok(ShellCommand::Login {
            username: args[0].clone(),
            password: arg(1),
        }),
        ("login", _) => usage("login <username> [password]"),
        ("whoami", 0) => Ok(ShellCommand::Whoami),
        ("send-verification", 0) => Ok(ShellCommand::SendVerification),
        ("verify", 1) => Ok(ShellCommand::Verify {
            token: args[0].clone(),
        }),
        ("verify", _) => usage("verify <token>"),
        ("forgot", 1) => Ok(ShellCommand::Forgot {
            username: args[0].clone(),
        }),
        ("forgot", _) => usage("forgot <username>"),
        ("reset", 2 | 3) => Ok(ShellCommand::Reset {
            username: args[0].clone(),
            code: args[1].clone(),
            password: arg(2),
        }),
        ("reset", _) => usage("reset <username> <code> [new password]"),
        ("logout", 0) => Ok(ShellCommand::Logout),
        ("help" | "?", _) => Ok(ShellCommand::Help),
        ("exit" | "quit", _) => Ok(ShellCommand::Exit),
        (other, _) => Err(format!("unknown command '{}', type 'help'", other)),
    }
}

pub fn show_help_information() {
    println!("\n=== Account shell ===");
    println!("register <username> [password] \"<full name>\" <email>");
    println!("login <username> [password]");
    println!("whoami                      show the logged in user");
    println!("send-verification           mail a verification link to the logged in user");
    println!("verify <token>              confirm an email address");
    println!("forgot <username>           mail a password reset code");
    println!("reset <username> <code> [new password]");
    println!("logout");
    println!("exit");
}

/// Interactive session over an `AuthService`, remembering the last login
pub struct Shell<S, M>
where
    S: UserStore,
    M: Mailer + ?Sized + 'static,
{
    service: AuthService<S, M>,
    session: Option<AuthSession>,
}

impl<S, M> Shell<S, M>
where
    S: UserStore,
    M: Mailer + ?Sized + 'static,
{
    pub fn new(service: AuthService<S, M>) -> Self {
        Self {
            service,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// Read-eval loop until `exit` or end of input
    pub async fn run(&mut self) -> io::Result<()> {
        show_help_information();
        loop {
            let Some(line) = prompt("\n> ")? else {
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(Some(output)) => println!("{}", output),
                Ok(None) => return Ok(()),
                Err(e) => println!("Error ({}): {}", e.status_code(), e),
            }
        }
    }

    /// Run one command; `Ok(None)` means the shell should stop
    pub async fn execute(&mut self, command: ShellCommand) -> Result<Option<String>, AuthError> {
        let output = match command {
            ShellCommand::Register {
                username,
                password,
                full_name,
                email,
            } => {
                let password = password_or_prompt(password, "Password: ")?;
                let session = self
                    .service
                    .register(RegisterRequest::new(&username, &password, &full_name, &email))
                    .await?;
                let output = format!("Registered {}\n{}", session.user.username, render(&session));
                self.session = Some(session);
                output
            }
            ShellCommand::Login { username, password } => {
                let password = password_or_prompt(password, "Password: ")?;
                let session = self
                    .service
                    .login(LoginRequest::new(&username, &password))
                    .await?;
                let output = format!("Logged in as {}\ntoken: {}", session.user.username, session.token);
                self.session = Some(session);
                output
            }
            ShellCommand::Whoami => {
                let user = self.service.authenticate(self.current_token()).await?;
                format!(
                    "{} <{}> {}, verified={}, registered {}",
                    user.username,
                    user.email,
                    user.full_name,
                    user.verified,
                    format_timestamp(user.created_at)
                )
            }
            ShellCommand::SendVerification => {
                let user = self.service.authenticate(self.current_token()).await?;
                self.service.send_verification_mail(&user).await?;
                format!("Verification mail sent to {}", user.email)
            }
            ShellCommand::Verify { token } => {
                let access_token = self.service.confirm_verification(Some(&token)).await?;
                let user = self.service.authenticate(Some(&access_token)).await?;
                self.session = Some(AuthSession {
                    user,
                    token: access_token,
                });
                "Email verified".to_string()
            }
            ShellCommand::Forgot { username } => {
                self.service.send_forgot_code(Some(&username)).await?;
                "A reset code has been sent to your email".to_string()
            }
            ShellCommand::Reset {
                username,
                code,
                password,
            } => {
                let password = password_or_prompt(password, "New password: ")?;
                self.service
                    .reset_password(ResetPasswordRequest::new(&username, &password, &code))
                    .await?;
                "Password reset success".to_string()
            }
            ShellCommand::Logout => {
                self.session = None;
                "Logged out".to_string()
            }
            ShellCommand::Help => {
                show_help_information();
                String::new()
            }
            ShellCommand::Exit => {
                println!("Goodbye!");
                return Ok(None);
            }
        };
        Ok(Some(output))
    }

    fn current_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }
}

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String, AuthError> {
    match password {
        Some(password) => Ok(password),
        None => rpassword::prompt_password(label).map_err(|_| AuthError::MissingParameters),
    }
}

fn render(session: &AuthSession) -> String {
    serde_json::to_string_pretty(session).unwrap_or_else(|_| session.token.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::store::InMemoryUserStore;
    use crate::modules::config::ServiceConfig;
    use crate::modules::email::mailer::LogMailer;
    use std::sync::Arc;

    fn shell() -> Shell<InMemoryUserStore, LogMailer> {
        let config = ServiceConfig::new("shell-secret").hash_iterations(1_000);
        Shell::new(AuthService::new(
            &config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(LogMailer),
        ))
    }

    #[test]
    fn test_parse_register_with_quoted_name() {
        assert_eq!(
            parse_command(r#"register alice Secr3t! "Alice A" a@x.com"#).unwrap(),
            ShellCommand::Register {
                username: "alice".to_string(),
                password: Some("Secr3t!".to_string()),
                full_name: "Alice A".to_string(),
                email: "a@x.com".to_string(),
            }
        );
        assert_eq!(
            parse_command(r#"register alice "Alice A" a@x.com"#).unwrap(),
            ShellCommand::Register {
                username: "alice".to_string(),
                password: None,
                full_name: "Alice A".to_string(),
                email: "a@x.com".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_arity_and_unknown_commands() {
        assert!(parse_command("login").unwrap_err().starts_with("usage:"));
        assert!(parse_command("reset alice").unwrap_err().starts_with("usage:"));
        assert!(parse_command("dance").unwrap_err().contains("unknown command"));
        assert!(parse_command("").is_err());
        assert_eq!(parse_command("QUIT").unwrap(), ShellCommand::Exit);
    }

    #[tokio::test]
    async fn test_session_follows_login_and_logout() {
        let mut shell = shell();

        shell
            .execute(parse_command(r#"register alice Secr3t! "Alice A" a@x.com"#).unwrap())
            .await
            .unwrap();
        assert!(shell.session().is_some());

        let whoami = shell.execute(ShellCommand::Whoami).await.unwrap().unwrap();
        assert!(whoami.starts_with("alice <a@x.com> Alice A, verified=false"));

        shell.execute(ShellCommand::Logout).await.unwrap();
        assert!(matches!(
            shell.execute(ShellCommand::Whoami).await,
            Err(AuthError::MissingToken)
        ));

        assert!(matches!(
            shell.execute(parse_command("login alice wrong").unwrap()).await,
            Err(AuthError::InvalidCredentials)
        ));
        shell
            .execute(parse_command("login alice Secr3t!").unwrap())
            .await
            .unwrap();
        assert_eq!(shell.session().unwrap().user.username, "alice");
    }

    #[tokio::test]
    async fn test_exit_stops_the_loop() {
        let mut shell = shell();
        assert_eq!(shell.execute(ShellCommand::Exit).await.unwrap(), None);
    }
}
