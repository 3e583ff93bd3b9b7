// Version and build metadata captured by build.rs

/// Build information structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_date: &'static str,
    pub git_hash: &'static str,
    pub git_clean: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
}

/// Get current build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        git_clean: option_env!("GIT_CLEAN").unwrap_or("unknown"),
        target: option_env!("BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("BUILD_PROFILE").unwrap_or("unknown"),
    }
}

impl BuildInfo {
    /// One-line version, e.g. `svcguard v0.1.0 (commit 1a2b3c4) [dirty]`
    pub fn format_display(&self) -> String {
        let mut result = format!("svcguard v{}", self.version);

        if !self.git_hash.is_empty() && self.git_hash != "unknown" {
            result.push_str(&format!(" (commit {})", self.git_hash));
        }
        if self.git_clean == "false" {
            result.push_str(" [dirty]");
        }

        result
    }

    pub fn format_build_info(&self) -> String {
        format!(
            "Build: {}\nTarget: {}\nProfile: {}\nGit: {}\nClean: {}",
            self.build_date, self.target, self.profile, self.git_hash, self.git_clean
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_version() {
        let info = build_info();
        assert!(info.format_display().starts_with(&format!("svcguard v{}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn test_display_marks_dirty_tree() {
        let info = BuildInfo {
            version: "1.2.3",
            build_date: "2026-01-01T00:00:00Z",
            git_hash: "abc1234",
            git_clean: "false",
            target: "x86_64-unknown-linux-gnu",
            profile: "release",
        };
        assert_eq!(info.format_display(), "svcguard v1.2.3 (commit abc1234) [dirty]");
        assert!(info.format_build_info().contains("Profile: release"));
    }
}
