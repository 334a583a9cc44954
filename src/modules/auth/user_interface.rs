// src/modules/auth/user_interface.rs
use log::warn;
use std::io;

use super::flows::Authenticator;
use super::password::validate_password;
use crate::modules::utils::io::Console;

/// Result of one menu action for flow control
#[derive(Debug, PartialEq, Eq)]
enum FlowStep {
    Continue,    // Show the menu again
    InputClosed, // Input stream ended, leave the loop
}

/// Function to show the menu options
pub fn show_menu(console: &mut dyn Console) {
    console.say(&"-".repeat(48));
    console.say("[1] Register a new user   (or type 'register')");
    console.say("[2] Login                 (or type 'login')");
    console.say("[3] Exit                  (or type 'exit')");
    console.say(&"-".repeat(48));
}

/// Main register/login/exit loop. Returns when the user exits or input ends;
/// failures of a single action are reported and the loop carries on.
pub fn run_menu(console: &mut dyn Console, auth: &Authenticator<'_>) -> io::Result<()> {
    console.say("Welcome to the Secure Authentication Program");
    loop {
        show_menu(console);

        let Some(choice) = console.read_line("Please select an option (1-3): ")? else {
            console.say("Exiting... Goodbye.");
            return Ok(());
        };

        let step = match choice.to_lowercase().as_str() {
            "1" | "register" => handle_registration(console, auth)?,
            "2" | "login" => handle_login(console, auth)?,
            "3" | "exit" | "quit" => {
                console.say("Exiting... Goodbye.");
                return Ok(());
            }
            _ => {
                console.say("Invalid option. Please select 1, 2 or 3.");
                FlowStep::Continue
            }
        };

        if step == FlowStep::InputClosed {
            console.say("Exiting... Goodbye.");
            return Ok(());
        }
    }
}

// Read a masked secret; an unavailable terminal aborts only this action
fn read_secret(console: &mut dyn Console, prompt: &str) -> Result<Option<String>, String> {
    console.read_secret(prompt).map_err(|e| {
        warn!("Masked input failed: {}", e);
        "Password input requires an interactive terminal.".to_string()
    })
}

fn handle_registration(
    console: &mut dyn Console,
    auth: &Authenticator<'_>,
) -> io::Result<FlowStep> {
    console.say("--- USER REGISTRATION ---");
    let policy = auth.policy();

    let Some(username) = console.read_line("Enter a username: ")? else {
        return Ok(FlowStep::InputClosed);
    };
    if let Err(e) = auth.check_username_available(&username) {
        console.say(&format!("Error: {}", e.public_message(policy)));
        return Ok(FlowStep::Continue);
    }

    let password = match read_secret(console, "Enter a password: ") {
        Ok(Some(password)) => password,
        Ok(None) => return Ok(FlowStep::InputClosed),
        Err(message) => {
            console.say(&format!("Error: {}", message));
            return Ok(FlowStep::Continue);
        }
    };
    if let Err(e) = validate_password(&password) {
        console.say(&format!("Error: {}", e));
        return Ok(FlowStep::Continue);
    }

    let confirmation = match read_secret(console, "Confirm password: ") {
        Ok(Some(confirmation)) => confirmation,
        Ok(None) => return Ok(FlowStep::InputClosed),
        Err(message) => {
            console.say(&format!("Error: {}", message));
            return Ok(FlowStep::Continue);
        }
    };

    match auth.register(&username, &password, &confirmation, None) {
        Ok(()) => console.say(&format!(
            "Success: User '{}' registered successfully!",
            username
        )),
        Err(e) => console.say(&format!("Error: {}", e.public_message(policy))),
    }
    Ok(FlowStep::Continue)
}

fn handle_login(console: &mut dyn Console, auth: &Authenticator<'_>) -> io::Result<FlowStep> {
    console.say("--- USER LOGIN ---");

    let Some(username) = console.read_line("Enter your username: ")? else {
        return Ok(FlowStep::InputClosed);
    };
    let password = match read_secret(console, "Enter your password: ") {
        Ok(Some(password)) => password,
        Ok(None) => return Ok(FlowStep::InputClosed),
        Err(message) => {
            console.say(&format!("Error: {}", message));
            return Ok(FlowStep::Continue);
        }
    };

    match auth.login(&username, &password) {
        Ok(record) => console.say(&format!("Success: Welcome, {}!", record.username)),
        Err(e) => console.say(&format!("Error: {}", e.public_message(auth.policy()))),
    }
    Ok(FlowStep::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::flows::LoginPolicy;
    use crate::modules::auth::hasher::{CredentialHasher, MIN_ROUNDS};
    use crate::modules::store::{CredentialStore, SqliteStore};
    use crate::modules::utils::io::ScriptedConsole;

    fn run(store: &SqliteStore, policy: LoginPolicy, inputs: &[&str]) -> String {
        let auth =
            Authenticator::new(store, CredentialHasher::new(MIN_ROUNDS)).with_policy(policy);
        let mut console = ScriptedConsole::new(inputs.iter().copied());
        run_menu(&mut console, &auth).unwrap();
        console.transcript()
    }

    #[test]
    fn test_register_login_exit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let transcript = run(
            &store,
            LoginPolicy::Distinguish,
            &[
                "1", "alice", "Wonder1and", "Wonder1and", "2", "alice", "Wonder1and", "3",
            ],
        );

        assert!(transcript.contains("Success: User 'alice' registered successfully!"));
        assert!(transcript.contains("Success: Welcome, alice!"));
        assert!(transcript.ends_with("Exiting... Goodbye."));
        assert!(!transcript.contains("$pbkdf2"));
    }

    #[test]
    fn test_registration_errors_are_reported_inline() {
        let store = SqliteStore::open_in_memory().unwrap();
        let transcript = run(
            &store,
            LoginPolicy::Distinguish,
            &[
                "register", "ab", // bad username
                "register", "alice", "alllower1", // weak password
                "register", "alice", "Wonder1and", "Wonder2and", // mismatch
                "exit",
            ],
        );

        assert!(transcript.contains("Error: Username must be 3-20 characters, letters and digits only."));
        assert!(transcript.contains("Error: Password must include at least one uppercase letter."));
        assert!(transcript.contains("Error: Passwords do not match."));
        assert!(store.lookup("alice").unwrap().is_none());
    }

    #[test]
    fn test_existing_username_stops_before_password_prompt() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("alice", "$pbkdf2-sha256$i=1000,l=32$c2FsdA$ZGlnZXN0", None).unwrap();

        let transcript = run(&store, LoginPolicy::Distinguish, &["1", "alice", "3"]);
        assert!(transcript.contains("Error: Username already exists."));
        assert!(!transcript.contains("Enter a password: "));
    }

    #[test]
    fn test_login_messages_follow_policy() {
        let store = SqliteStore::open_in_memory().unwrap();
        let setup = ["1", "alice", "Wonder1and", "Wonder1and"];

        let mut inputs = setup.to_vec();
        inputs.extend(["2", "bob", "Wonder1and", "2", "alice", "nope", "3"]);
        let transcript = run(&store, LoginPolicy::Distinguish, &inputs);
        assert!(transcript.contains("Error: Username not found."));
        assert!(transcript.contains("Error: Invalid password."));

        let unified = SqliteStore::open_in_memory().unwrap();
        let transcript = run(&unified, LoginPolicy::Unified, &inputs);
        assert!(!transcript.contains("Username not found."));
        assert_eq!(transcript.matches("Error: Invalid username or password.").count(), 2);
    }

    #[test]
    fn test_invalid_option_and_end_of_input() {
        let store = SqliteStore::open_in_memory().unwrap();
        let transcript = run(&store, LoginPolicy::Distinguish, &["9", "2", "alice"]);

        assert!(transcript.contains("Invalid option. Please select 1, 2 or 3."));
        assert!(transcript.ends_with("Exiting... Goodbye."));
    }
}
