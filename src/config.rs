use crate::marks::MarkPolicy;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "gradesheetd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Learner marks sidecar: roster import, mark entry and results export over JSON lines")]
pub struct Config {
    /// Directory that relative or omitted export paths resolve against
    #[arg(long, env = "GRADESHEETD_EXPORT_DIR", default_value = ".")]
    pub export_dir: PathBuf,

    /// Log filter used when RUST_LOG is not set (e.g. "debug", "gradesheetd=trace")
    #[arg(long, env = "GRADESHEETD_LOG", default_value = "info")]
    pub log_level: String,

    /// Accept marks above a field's maximum instead of rejecting them
    #[arg(long, env = "GRADESHEETD_LENIENT_MARKS")]
    pub lenient_marks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            lenient_marks: false,
        }
    }
}

impl Config {
    pub fn mark_policy(&self) -> MarkPolicy {
        if self.lenient_marks {
            MarkPolicy::Lenient
        } else {
            MarkPolicy::Enforced
        }
    }

    /// Absolute paths are kept; relative ones land under `export_dir`;
    /// no path means `export_dir/default_name`.
    pub fn resolve_export_path(&self, requested: Option<&str>, default_name: &str) -> PathBuf {
        match requested.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
            Some(p) => self.export_dir.join(p),
            None => self.export_dir.join(default_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cfg = Config::parse_from([
            "gradesheetd",
            "--export-dir",
            "/tmp/out",
            "--lenient-marks",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cfg.export_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.mark_policy(), MarkPolicy::Lenient);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn default_policy_enforces_maxima() {
        assert_eq!(Config::default().mark_policy(), MarkPolicy::Enforced);
    }

    #[test]
    fn export_paths_resolve_against_export_dir() {
        let cfg = Config {
            export_dir: PathBuf::from("/data/exports"),
            ..Config::default()
        };
        assert_eq!(
            cfg.resolve_export_path(None, "learners_results.xlsx"),
            PathBuf::from("/data/exports/learners_results.xlsx")
        );
        assert_eq!(
            cfg.resolve_export_path(Some("  "), "learners_results.xlsx"),
            PathBuf::from("/data/exports/learners_results.xlsx")
        );
        assert_eq!(
            cfg.resolve_export_path(Some("term1/out.xlsx"), "x.xlsx"),
            PathBuf::from("/data/exports/term1/out.xlsx")
        );
        assert_eq!(
            cfg.resolve_export_path(Some("/elsewhere/out.xlsx"), "x.xlsx"),
            PathBuf::from("/elsewhere/out.xlsx")
        );
    }
}
