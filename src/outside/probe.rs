use tracing::{debug, error, info};

use super::command::{CommandRunner, Invocation};

/// An external tool and the command proving it can be run
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub check: Invocation,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

impl ProbeReport {
    pub fn all_present(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Run every check command. A tool is present iff its check exits successfully.
pub fn probe(runner: &dyn CommandRunner, specs: &[ToolSpec]) -> ProbeReport {
    let mut report = ProbeReport::default();

    for spec in specs {
        match runner.run(&spec.check) {
            Ok(res) if res.success => {
                info!("{} is installed and accessible", spec.name);
                report.present.push(spec.name.clone());
            }
            Ok(res) => {
                error!(
                    "{} not usable: `{}` exited with {}",
                    spec.name,
                    spec.check,
                    res.code.map_or("no code".to_string(), |c| c.to_string())
                );
                debug!("stderr: {}", res.stderr_lossy());
                report.missing.push(spec.name.clone());
            }
            Err(err) => {
                error!("{} not found: `{}` failed: {err}", spec.name, spec.check);
                report.missing.push(spec.name.clone());
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outside::{fake::FakeRunner, Ffmpeg, ToolCommand, Ytdl};

    fn specs() -> Vec<ToolSpec> {
        vec![
            Ffmpeg::tool_spec(&ToolCommand::new("ffmpeg")),
            Ytdl::tool_spec(&ToolCommand::new("yt-dlp")),
        ]
    }

    #[test]
    fn every_tool_present() {
        let runner = FakeRunner::new();
        let report = probe(&runner, &specs());

        assert!(report.all_present());
        assert_eq!(report.present.len(), 2);
        assert_eq!(runner.count("ffmpeg -version"), 1);
        assert_eq!(runner.count("yt-dlp --version"), 1);
    }

    #[test]
    fn failing_and_unspawnable_tools_are_missing() {
        let runner = FakeRunner::new().missing("yt-dlp");
        let report = probe(&runner, &specs());
        assert_eq!(report.missing, vec!["yt-dlp (yt-dlp)".to_string()]);
        assert!(!report.all_present());

        let runner = FakeRunner::new().failing_on("-version");
        let report = probe(&runner, &specs());
        assert_eq!(report.missing.len(), 2);
        assert!(report.present.is_empty());
    }
}
