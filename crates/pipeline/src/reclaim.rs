//! Removal of drained source folders.

use crate::Layout;
use thermo_remote::{RemotePath, RemoteSession};

/// Remove the image sub-folder and then the date folder itself, each only if
/// listing it shows no entries.
///
/// Only for past folders: today's folder keeps receiving files. Every failure
/// is logged and otherwise ignored. Returns the folders actually removed.
///
/// Servers that refuse to list an empty folder (450/550 on NLST) therefore
/// never get their folders reclaimed.
pub async fn reclaim_folder(session: &dyn RemoteSession, layout: &Layout, date_folder: &RemotePath) -> Vec<String> {
    let mut removed = Vec::new();
    if let Ok(image_folder) = date_folder.join(&layout.image_dir)
        && remove_if_empty(session, &image_folder).await
    {
        removed.push(image_folder.to_string());
    }
    if remove_if_empty(session, date_folder).await {
        removed.push(date_folder.to_string());
    }
    removed
}

async fn remove_if_empty(session: &dyn RemoteSession, folder: &RemotePath) -> bool {
    match session.list(folder).await {
        Ok(names) if names.is_empty() => {},
        Ok(names) => {
            tracing::debug!(folder = %folder, entries = names.len(), "Folder not empty; keeping");
            return false;
        },
        Err(e) => {
            tracing::debug!(folder = %folder, error = %e, "Folder not listable; keeping");
            return false;
        },
    }
    match session.remove_dir(folder).await {
        Ok(()) => {
            tracing::info!(folder = %folder, "Removed empty folder");
            true
        },
        Err(e) => {
            tracing::debug!(folder = %folder, error = %e, "Could not remove folder");
            false
        },
    }
}
