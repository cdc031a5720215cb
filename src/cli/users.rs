use clap::Subcommand;
use rand::Rng;
use sqlx::PgPool;

use crate::auth::hash_password;
use crate::storage::{CreateUser, PostgresUserStore, Role, UserStore};

/// User management subcommands. Accounts are only ever provisioned here,
/// never through the HTTP surface.
#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Create {
        /// User's email address
        #[arg(short, long)]
        email: String,

        /// User's display name
        #[arg(short, long)]
        name: String,

        /// Password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,

        /// Give this user the admin role (required to log in)
        #[arg(long)]
        admin: bool,
    },

    /// List all users
    List,

    /// Show user details
    Show {
        /// User's email address
        email: String,
    },

    /// Reset a user's password
    ResetPassword {
        /// User's email address
        #[arg(short, long)]
        email: String,

        /// New password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Change a user's role
    SetRole {
        /// User's email address
        #[arg(short, long)]
        email: String,

        /// New role: admin or user
        #[arg(short, long)]
        role: String,
    },

    /// Delete a user (cascades to their sessions)
    Delete {
        /// User's email address
        #[arg(short, long)]
        email: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl UserCommands {
    /// Execute the user command
    pub async fn execute(self, pool: PgPool) -> anyhow::Result<()> {
        let user_store = PostgresUserStore::new(pool);

        match self {
            UserCommands::Create {
                email,
                name,
                password,
                admin,
            } => {
                let password = password.unwrap_or_else(generate_secure_password);
                let password_hash = hash_password(&password)?;
                let role = if admin { Role::Admin } else { Role::User };

                let user = user_store
                    .create_user(CreateUser {
                        email: email.clone(),
                        full_name: name.clone(),
                        password_hash,
                        role,
                    })
                    .await?;

                println!("✅ User created successfully!");
                println!();
                println!("   Email:    {}", user.email);
                println!("   Name:     {}", user.full_name);
                println!("   Password: {}", password);
                println!("   Role:     {}", user.role.as_str());
                println!();
                println!("⚠️  Please securely share these credentials with the user.");
            }

            UserCommands::List => {
                let users = user_store.list_users().await?;

                if users.is_empty() {
                    println!("No users found.");
                    return Ok(());
                }

                println!(
                    "{:<36} {:<30} {:<20} {:<8}",
                    "ID", "Email", "Name", "Role"
                );
                println!("{}", "-".repeat(96));

                for user in users {
                    println!(
                        "{:<36} {:<30} {:<20} {:<8}",
                        user.id,
                        truncate(&user.email, 28),
                        truncate(&user.full_name, 18),
                        user.role.as_str()
                    );
                }
            }

            UserCommands::Show { email } => {
                let user = user_store.get_user_by_email(&email).await?;

                println!("User Details:");
                println!("  ID:         {}", user.id);
                println!("  Email:      {}", user.email);
                println!("  Name:       {}", user.full_name);
                println!("  Role:       {}", user.role.as_str());
                println!("  Created:    {}", user.created_at);
                println!("  Updated:    {}", user.updated_at);
                println!(
                    "  Last Login: {}",
                    user.last_login
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "Never".to_string())
                );
            }

            UserCommands::ResetPassword { email, password } => {
                let user = user_store.get_user_by_email(&email).await?;
                let password = password.unwrap_or_else(generate_secure_password);
                let password_hash = hash_password(&password)?;

                user_store.update_password(user.id, &password_hash).await?;

                println!("✅ Password reset successfully!");
                println!();
                println!("   Email:        {}", user.email);
                println!("   New Password: {}", password);
                println!();
                println!("⚠️  Please securely share the new password with the user.");
                println!("   Existing sessions stay active until they expire.");
            }

            UserCommands::SetRole { email, role } => {
                let role = Role::parse(&role)
                    .ok_or_else(|| anyhow::anyhow!("unknown role: {role} (use admin or user)"))?;
                let user = user_store.get_user_by_email(&email).await?;
                user_store.set_role(user.id, role).await?;

                println!("✅ Role of {} set to {}.", email, role.as_str());
            }

            UserCommands::Delete { email, force } => {
                let user = user_store.get_user_by_email(&email).await?;

                if !force {
                    println!("Are you sure you want to delete user {}? (y/N)", email);
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;
                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Cancelled.");
                        return Ok(());
                    }
                }

                user_store.delete_user(user.id).await?;
                println!("✅ User {} has been deleted.", email);
            }
        }

        Ok(())
    }
}

/// Generate a secure random password
fn generate_secure_password() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%&*";
    let mut rng = rand::thread_rng();

    (0..16)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Truncate string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_are_long_and_distinct() {
        let a = generate_secure_password();
        let b = generate_secure_password();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn truncate_is_a_noop_for_short_strings() {
        assert_eq!(truncate("short", 28), "short");
        assert_eq!(truncate("a-very-long-email@example.com", 10), "a-very-...");
    }
}
