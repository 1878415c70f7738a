use std::future::Future;

use futures::future::try_join_all;
use tracing::info;

use crate::{models::{EditResult, StylePreset}, prompts::preset_prompt};

/// Runs one edit per preset concurrently.
///
/// Results come back in preset order no matter which call settles first. The
/// first failure resolves the whole batch and the calls still in flight are
/// dropped, so callers never see a partial set.
pub async fn edit_all_presets<E, F, Fut>(presets: &[StylePreset], user_prompt: &str, edit: F) -> Result<Vec<EditResult>, E>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    info!("🚀 Fanning out {} preset edits", presets.len());
    let calls = presets.iter().map(|preset| {
        let call = edit(preset_prompt(preset, user_prompt));
        async move {
            let b64 = call.await?;
            Ok::<_, E>(EditResult::from_b64(Some(preset.slug.clone()), &b64))
        }
    });
    let results = try_join_all(calls).await?;
    info!("✅ All {} preset edits completed", results.len());
    Ok(results)
}
