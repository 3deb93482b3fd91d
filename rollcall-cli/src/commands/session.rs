//! Sign-in commands.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::{KeyValueStore, Roster, Session, USER_EMAIL_KEY};

use crate::HostArgs;

fn load_roster(path: Option<&Path>) -> Result<Roster> {
    let Some(path) = path else {
        return Ok(Roster::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster: {}", path.display()))?;
    Ok(Roster::from_json(&json)?)
}

fn open(host: &HostArgs, roster: Option<PathBuf>) -> Result<Session> {
    let roster = load_roster(roster.as_deref())?;
    Ok(Session::restore(Rc::new(host.page_store()), roster)?)
}

/// Execute the login command.
pub fn login(host: &HostArgs, email: &str, roster: PathBuf) -> Result<()> {
    let mut session = open(host, Some(roster))?;
    let user = session.login(email)?;

    if host.quiet {
        println!("{}", user.role);
    } else {
        println!(
            "{} {} ({})",
            "Signed in as".green(),
            user.email.bold(),
            user.role
        );
    }
    Ok(())
}

/// Execute the logout command.
pub fn logout(host: &HostArgs) -> Result<()> {
    // Signing out never needs the roster.
    let mut session = open(host, None)?;
    session.logout()?;
    if !host.quiet {
        println!("{}", "Signed out.".dimmed());
    }
    Ok(())
}

/// Execute the whoami command.
pub fn whoami(host: &HostArgs, roster: Option<PathBuf>) -> Result<()> {
    if roster.is_none() {
        // Without a roster the role cannot be resolved; leave the sign-in alone.
        match host.page_store().get(USER_EMAIL_KEY)? {
            Some(email) => println!("{email}"),
            None => println!("{}", "Not signed in.".dimmed()),
        }
        return Ok(());
    }
    let session = open(host, roster)?;
    match session.current() {
        Some(user) => println!("{} ({})", user.email, user.role),
        None => println!("{}", "Not signed in.".dimmed()),
    }
    Ok(())
}
