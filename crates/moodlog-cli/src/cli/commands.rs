use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use moodlog_core::models::{
    EntryDraft, EntryId, EntryPatch, ImageUpload, Mood, TimeFilter, UserProfile,
};
use moodlog_core::stats::dominant_mood;
use moodlog_core::{CoreRuntime, FeedSnapshot, FeedStore};
use serde_json::{json, Value};
use tracing::debug;

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Write a new entry
    Add {
        mood: Mood,
        text: String,
        image: Option<PathBuf>,
    },
    /// Newest entries, plus `pages` backfill pages
    Timeline { pages: usize },
    /// Change the mood and/or text of an entry
    Edit {
        id: String,
        mood: Option<Mood>,
        text: Option<String>,
    },
    Delete { id: String },
    /// Mood counts over a window
    Stats { window: TimeFilter },
    /// Every user's entries (admin)
    All,
    /// Registered users (admin)
    Users,
    /// Set the signed-in user's profile photo
    Photo { path: PathBuf },
}

/// Sign in as `user_id` and wait for the feed to follow. The admin code is
/// only looked at the first time a user signs in.
pub async fn sign_in(
    runtime: &CoreRuntime,
    user_id: &str,
    admin_code: Option<&str>,
) -> Result<UserProfile> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        bail!("A user is required. Pass --user or set userId in the config file.");
    }
    let profile = runtime
        .sign_in(user_id, "", "", admin_code)
        .await
        .with_context(|| format!("Failed to sign in as {}", user_id))?;
    runtime.feed().open(profile.id.clone()).await;
    Ok(profile)
}

async fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(ImageUpload::new(bytes, content_type_for(path)))
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

fn feed_json(snapshot: &FeedSnapshot) -> Result<Value> {
    Ok(json!({
        "entries": serde_json::to_value(&snapshot.entries)?,
        "hasMore": snapshot.has_more,
        "error": snapshot.error.as_ref().map(|e| e.to_string()),
    }))
}

/// Page through the rest of the feed. Stops at the end or on the first error.
async fn load_all_pages(feed: &FeedStore) -> FeedSnapshot {
    loop {
        let snapshot = feed.snapshot();
        if !snapshot.has_more || snapshot.error.is_some() {
            return snapshot;
        }
        feed.load_more().await;
    }
}

pub async fn execute(runtime: &CoreRuntime, command: CliCommand) -> Result<Value> {
    let journal = runtime.journal();
    let feed = runtime.feed();
    debug!(?command, "executing");

    match command {
        CliCommand::Add { mood, text, image } => {
            let mut draft = EntryDraft::new(mood).text(text);
            if let Some(path) = image {
                draft = draft.image(read_image(&path).await?);
            }
            let id = journal.create_entry(draft).await?;
            Ok(json!({ "id": id }))
        }
        CliCommand::Timeline { pages } => {
            for _ in 0..pages {
                feed.load_more().await;
            }
            feed_json(&feed.snapshot())
        }
        CliCommand::Edit { id, mood, text } => {
            let id = EntryId::new(id);
            journal.update_entry(&id, EntryPatch { mood, text }).await?;
            Ok(json!({ "id": id, "updated": true }))
        }
        CliCommand::Delete { id } => {
            let id = EntryId::new(id);
            journal.delete_entry(&id).await?;
            Ok(json!({ "id": id, "deleted": true }))
        }
        CliCommand::Stats { window } => {
            let snapshot = load_all_pages(&feed).await;
            if let Some(error) = snapshot.error {
                bail!("Could not load entries: {}", error);
            }
            let counts = journal.mood_stats(window, Utc::now());
            Ok(json!({
                "window": window.label(),
                "counts": counts,
                "total": counts.total(),
                "dominant": dominant_mood(&counts).map(|m| m.label()),
            }))
        }
        CliCommand::All => {
            let entries = journal.list_all_entries().await?;
            Ok(json!({ "entries": entries }))
        }
        CliCommand::Users => {
            let users = journal.list_users().await?;
            Ok(json!({ "users": users }))
        }
        CliCommand::Photo { path } => {
            let profile = journal.set_profile_photo(read_image(&path).await?).await?;
            Ok(json!({ "id": profile.id, "photoUrl": profile.photo_url }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodlog_core::CoreConfig;

    fn runtime(dir: &Path) -> CoreRuntime {
        let mut config = CoreConfig::new(dir).with_page_size(2).with_live_window(2);
        config.admin_code = Some("letmein".to_string());
        CoreRuntime::local(config).unwrap()
    }

    async fn add(runtime: &CoreRuntime, mood: Mood, text: &str) -> String {
        let value = execute(
            runtime,
            CliCommand::Add {
                mood,
                text: text.to_string(),
                image: None,
            },
        )
        .await
        .unwrap();
        value["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_add_and_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        sign_in(&runtime, "alice", None).await.unwrap();

        for (mood, text) in [(Mood::Calm, "one"), (Mood::Sad, "two"), (Mood::Joyful, "three")] {
            add(&runtime, mood, text).await;
        }

        let live_only = execute(&runtime, CliCommand::Timeline { pages: 0 })
            .await
            .unwrap();
        assert_eq!(live_only["entries"].as_array().unwrap().len(), 2);

        let paged = execute(&runtime, CliCommand::Timeline { pages: 2 })
            .await
            .unwrap();
        let texts: Vec<&str> = paged["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["three", "two", "one"]);
        assert_eq!(paged["hasMore"], false);
    }

    #[tokio::test]
    async fn test_add_with_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.PNG");
        std::fs::write(&image, [137, 80, 78, 71]).unwrap();
        let runtime = runtime(&dir.path().join("store"));
        sign_in(&runtime, "alice", None).await.unwrap();

        execute(
            &runtime,
            CliCommand::Add {
                mood: Mood::Joyful,
                text: String::new(),
                image: Some(image),
            },
        )
        .await
        .unwrap();
        let entry = &runtime.feed().entries()[0];
        assert!(entry.image_ref.as_deref().unwrap().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_stats_cover_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        sign_in(&runtime, "alice", None).await.unwrap();
        for text in ["a", "b", "c", "d", "e"] {
            add(&runtime, Mood::Angry, text).await;
        }
        add(&runtime, Mood::Calm, "f").await;

        let stats = execute(
            &runtime,
            CliCommand::Stats {
                window: TimeFilter::AllTime,
            },
        )
        .await
        .unwrap();
        assert_eq!(stats["total"], 6);
        assert_eq!(stats["counts"]["angry"], 5);
        assert_eq!(stats["dominant"], "angry");
        assert_eq!(stats["window"], "all");
    }

    #[tokio::test]
    async fn test_edit_delete_and_admin() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        sign_in(&runtime, "alice", None).await.unwrap();
        let id = add(&runtime, Mood::Calm, "draft").await;

        execute(
            &runtime,
            CliCommand::Edit {
                id: id.clone(),
                mood: None,
                text: Some("final".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(runtime.feed().entries()[0].text, "final");

        assert!(execute(&runtime, CliCommand::All).await.is_err());

        sign_in(&runtime, "root", Some("letmein")).await.unwrap();
        let all = execute(&runtime, CliCommand::All).await.unwrap();
        assert_eq!(all["entries"].as_array().unwrap().len(), 1);

        execute(&runtime, CliCommand::Delete { id }).await.unwrap();
        let all = execute(&runtime, CliCommand::All).await.unwrap();
        assert!(all["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_requires_user() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        assert!(sign_in(&runtime, "  ", None).await.is_err());
    }

    #[tokio::test]
    async fn test_admin_code_only_counts_at_registration() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        sign_in(&runtime, "alice", None).await.unwrap();

        let again = sign_in(&runtime, "alice", Some("letmein")).await.unwrap();
        assert!(!again.role.is_admin());
        assert!(execute(&runtime, CliCommand::Users).await.is_err());
    }

    #[tokio::test]
    async fn test_users_and_photo() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("me.jpg");
        std::fs::write(&image, [255, 216, 255]).unwrap();
        let runtime = runtime(&dir.path().join("store"));

        sign_in(&runtime, "alice", None).await.unwrap();
        let photo = execute(&runtime, CliCommand::Photo { path: image })
            .await
            .unwrap();
        let url = photo["photoUrl"].as_str().unwrap().to_string();
        assert!(url.ends_with(".jpg"));
        assert!(execute(
            &runtime,
            CliCommand::Photo {
                path: dir.path().join("missing.png")
            }
        )
        .await
        .is_err());

        sign_in(&runtime, "root", Some("letmein")).await.unwrap();
        let listed = execute(&runtime, CliCommand::Users).await.unwrap();
        let users = listed["users"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["id"], "alice");
        assert_eq!(users[0]["photoUrl"], url.as_str());
        assert_eq!(users[1]["role"], "admin");
    }
}
