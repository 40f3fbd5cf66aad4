use std::sync::LazyLock;

use crate::build_info::BUILD_INFO;

/// Defines the application version, `<image version>-<commit>[-dirty]`.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}-{}{}",
        env!("IMAGE_VERSION"),
        BUILD_INFO.commit_sha1.unwrap_or("unknown"),
        dirty_suffix(BUILD_INFO.git_dirty)
    )
});

fn dirty_suffix(git_dirty: Option<&str>) -> &'static str {
    if git_dirty == Some("true") {
        "-dirty"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_starts_with_image_version() {
        assert!(VERSION.starts_with(env!("IMAGE_VERSION")));
        assert!(VERSION.contains('-'));
    }

    #[test]
    fn dirty_suffix_only_for_dirty_tree() {
        assert_eq!(dirty_suffix(Some("true")), "-dirty");
        assert_eq!(dirty_suffix(Some("false")), "");
        assert_eq!(dirty_suffix(None), "");
    }
}
