use std::sync::LazyLock;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    let sha = option_env!("VERGEN_GIT_SHA")
        .map(|sha| &sha[..sha.len().min(8)])
        .unwrap_or("unknown");
    let dirty = option_env!("VERGEN_GIT_DIRTY") == Some("true");
    format!(
        "{}-{}{}",
        env!("IMAGE_VERSION"),
        sha,
        if dirty { "-dirty" } else { "" }
    )
});

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn version_starts_with_image_version() {
        let image_version = env!("IMAGE_VERSION");
        assert!(VERSION.starts_with(image_version));
        assert!(VERSION[image_version.len()..].starts_with('-'));
    }
}
