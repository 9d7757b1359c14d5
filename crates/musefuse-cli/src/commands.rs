//! Subcommand handlers.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Local};
use tracing::warn;

use musefuse_core::config::{PASSWORD_ENV, USERNAME_ENV};
use musefuse_core::models::Photo;
use musefuse_core::photos::StagedUpload;
use musefuse_core::{AuthError, Credentials, PhotoScope};

use crate::App;

pub async fn register(app: &App, username: Option<String>) -> Result<()> {
    let credentials = prompt_credentials(username, None)?;
    let response = app
        .api
        .register(&credentials)
        .await
        .context("Registration request failed")?;

    if response.error {
        bail!(response
            .message
            .unwrap_or_else(|| "Registration failed".to_string()));
    }
    println!(
        "{}",
        response
            .message
            .unwrap_or_else(|| format!("Registered {}", credentials.username()))
    );
    Ok(())
}

pub async fn login(app: &mut App, username: Option<String>) -> Result<()> {
    let credentials = prompt_credentials(username, app.config.last_username.as_deref())?;

    app.session.login(&credentials).await.map_err(|e| match e {
        AuthError::InvalidCredentials { message } => anyhow!(message),
        other => anyhow::Error::new(other).context("Login failed"),
    })?;

    app.config.last_username = Some(credentials.username().to_string());
    if let Err(e) = app.config.save() {
        warn!(error = %e, "Failed to remember username");
    }

    println!("Logged in as {}", credentials.username());
    print_expiry(app);
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    let was_authenticated = app.session.is_authenticated();
    app.session.logout();
    if was_authenticated {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub fn status(app: &App) -> Result<()> {
    if !app.session.is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    match &app.config.last_username {
        Some(user) => println!("Logged in as {}", user),
        None => println!("Logged in"),
    }
    print_expiry(app);
    Ok(())
}

pub async fn refresh(app: &App) -> Result<()> {
    app.session.refresh().await.map_err(|e| match e {
        AuthError::NotLoggedIn => anyhow!("Not logged in"),
        AuthError::RefreshRejected { message } => {
            anyhow!("{} (run `musefuse login`)", message)
        }
        other => anyhow::Error::new(other).context("Refresh failed"),
    })?;
    println!("Session refreshed");
    print_expiry(app);
    Ok(())
}

/// Follow the authentication flag until the session ends.
pub async fn watch(app: &App) -> Result<()> {
    let mut changes = app.session.subscribe();

    while let Some(authenticated) = changes.recv().await {
        let now = Local::now().format("%H:%M:%S");
        if authenticated {
            println!("[{}] authenticated", now);
            print_expiry(app);
        } else {
            println!("[{}] logged out", now);
            break;
        }
    }
    Ok(())
}

pub async fn photos(app: &App, mine: bool, page: usize, per_page: usize) -> Result<()> {
    let scope = if mine { PhotoScope::Mine } else { PhotoScope::All };
    let page = app
        .photos
        .page(scope, page, per_page)
        .await
        .context("Failed to list photos")?;

    if page.total_items == 0 {
        println!("No photos");
        return Ok(());
    }

    for photo in &page.items {
        println!("{}", photo_line(photo));
    }
    println!(
        "Page {}/{} ({} photos){}{}",
        page.page,
        page.total_pages,
        page.total_items,
        if page.has_previous() { "  [prev]" } else { "" },
        if page.has_next() { "  [next]" } else { "" },
    );
    Ok(())
}

pub async fn upload(app: &App, files: Vec<PathBuf>) -> Result<()> {
    let staged = StagedUpload::stage(files);
    for skipped in &staged.skipped {
        eprintln!("Skipping {} (not an image)", skipped.display());
    }
    if staged.accepted.is_empty() {
        bail!("No images to upload");
    }

    let batch = app.photos.upload_many(staged.accepted).await;
    for receipt in &batch.uploaded {
        let name = receipt.filename.as_deref().unwrap_or("photo");
        match &receipt.s3_url {
            Some(url) => println!("Uploaded {} -> {}", name, url),
            None => println!("Uploaded {}", name),
        }
    }

    if let Some((path, error)) = batch.failed {
        if !batch.remaining.is_empty() {
            eprintln!("{} file(s) not attempted", batch.remaining.len());
        }
        return Err(error).with_context(|| format!("Upload of {} failed", path.display()));
    }
    Ok(())
}

pub async fn delete(app: &App, filename: &str) -> Result<()> {
    app.photos
        .delete(filename)
        .await
        .with_context(|| format!("Failed to delete {}", filename))?;
    println!("Deleted {}", filename);
    Ok(())
}

// ===== Helpers =====

fn print_expiry(app: &App) {
    if let Some(expires_at) = app.session.expires_at() {
        let remaining = app.session.expires_in().unwrap_or_else(Duration::zero);
        println!(
            "Session expires at {} (in {})",
            expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            format_remaining(remaining)
        );
    }
}

fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn photo_line(photo: &Photo) -> String {
    format!(
        "{:<32} {:<16} {:<20} {}",
        photo.filename,
        photo.owner_display(),
        photo.upload_time.as_deref().unwrap_or("-"),
        photo.url
    )
}

/// Username from flag, environment, prompt (defaulting to the last one used).
/// Password from environment or a hidden prompt.
fn prompt_credentials(username: Option<String>, last: Option<&str>) -> Result<Credentials> {
    let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
        Some(name) => name,
        None => prompt_username(last)?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let credentials = Credentials::new(username.trim(), password);
    if !credentials.is_complete() {
        bail!("Username and password are required");
    }
    Ok(credentials)
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read username")?;

    let entered = line.trim();
    Ok(match (entered.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => entered.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(42)), "42s");
        assert_eq!(format_remaining(Duration::seconds(125)), "2m 5s");
        assert_eq!(format_remaining(Duration::seconds(3 * 3600 + 60 * 7)), "3h 7m");
        assert_eq!(format_remaining(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn test_photo_line_handles_missing_fields() {
        let photo = Photo {
            filename: "a.jpg".to_string(),
            url: "https://bucket/a.jpg".to_string(),
            thumbnail_url: "https://bucket/thumbnails/a.jpg".to_string(),
            upload_time: None,
            owner: None,
        };
        let line = photo_line(&photo);
        assert!(line.starts_with("a.jpg"));
        assert!(line.contains("unknown"));
        assert!(line.ends_with("https://bucket/a.jpg"));
    }
}
