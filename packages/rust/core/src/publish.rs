//! Gallery output: file rendering, naming, and writing.
//!
//! Published files start with a metadata docstring (title, description,
//! attribution, confidence) followed by the code, whose sections are split by
//! [`SECTION_MARKER`]. A `workflow_summary.json` report is written next to them,
//! newly imported tracked packages are appended to `requirements.txt`, and the
//! gallery `README.txt` gets a one-time notice about automated examples.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use galleryforge_shared::{CandidateArtifact, EnrichmentResult, GalleryError, Result, SECTION_MARKER};

use crate::summary::PipelineSummary;

/// File name of the run report.
pub const SUMMARY_FILE: &str = "workflow_summary.json";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const README_FILE: &str = "README.txt";

const AUTOMATION_HEADING: &str = "# Automated Examples";

const SLUG_LEN: usize = 30;
const MIN_RULE_WIDTH: usize = 40;

static NOT_SLUG_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A rendered file ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryFile {
    pub filename: String,
    pub source_name: String,
    pub contents: String,
}

/// Render one published artifact in the gallery file format.
pub fn render_gallery_file(artifact: &CandidateArtifact, result: &EnrichmentResult) -> String {
    let rule = "=".repeat((result.revised_title.chars().count() + 4).max(MIN_RULE_WIDTH));
    let source = &artifact.source_name;

    let mut out = format!(
        r#"# coding: utf-8
"""
{rule}
{title}
{rule}

{description}

This example was automatically scraped from {source} documentation and
improved using automated processing.

Source: {origin}
Processing confidence: {confidence:.2}
"""

{SECTION_MARKER}
# This example demonstrates {source} functionality
#
# Auto-generated and improved for the gallery
# {notes}

"#,
        title = result.revised_title,
        description = result.revised_description,
        origin = artifact.origin_location,
        confidence = result.confidence,
        notes = result.notes,
    );

    if !result.warnings.is_empty() {
        out.push_str("# Warnings:\n");
        for warning in &result.warnings {
            out.push_str(&format!("# - {warning}\n"));
        }
        out.push('\n');
    }

    out.push_str(&result.revised_body);
    out
}

/// Title reduced to `[a-z0-9_]`, at most 30 characters.
pub fn slugify(title: &str) -> String {
    let kept = NOT_SLUG_CHAR.replace_all(title, "");
    WHITESPACE_RUN
        .replace_all(&kept, "_")
        .to_lowercase()
        .chars()
        .take(SLUG_LEN)
        .collect()
}

/// `auto_<YYYYMMDD>_<source>_<NN>_<slug>.py`, with `position` 1-based.
pub fn gallery_filename(date: NaiveDate, source: &str, position: usize, title: &str) -> String {
    format!(
        "auto_{}_{source}_{position:02}_{}.py",
        date.format("%Y%m%d"),
        slugify(title)
    )
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// What [`Publisher::write`] put on disk.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub files: Vec<PathBuf>,
    pub summary_path: PathBuf,
    /// Packages appended to `requirements.txt`, sorted.
    pub requirements_added: Vec<String>,
    /// Whether the automation notice was added to `README.txt`.
    pub readme_updated: bool,
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    #[serde(flatten)]
    summary: &'a PipelineSummary,
    files: Vec<&'a str>,
}

/// Writes gallery files into one output directory.
#[derive(Debug, Clone)]
pub struct Publisher {
    dir: PathBuf,
    tracked_packages: BTreeSet<String>,
}

impl Publisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tracked_packages: BTreeSet::new(),
        }
    }

    /// Packages eligible for `requirements.txt`. Others are never added.
    pub fn with_tracked_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_packages = packages
            .into_iter()
            .map(|p| p.into().to_lowercase())
            .collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files already in the output directory whose name contains `source`.
    /// A missing directory counts as empty.
    pub fn count_existing(&self, source: &str) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| GalleryError::io(&self.dir, e))?;

        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| GalleryError::io(&self.dir, e))?;
            if entry.file_name().to_string_lossy().contains(source) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// [`Publisher::count_existing`] for each named source.
    pub fn existing_counts<'a>(
        &self,
        sources: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeMap<String, usize>> {
        sources
            .into_iter()
            .map(|name| Ok((name.to_string(), self.count_existing(name)?)))
            .collect()
    }

    /// Write every file, update `requirements.txt` and `README.txt`, then
    /// write the summary report listing the files.
    #[instrument(skip_all, fields(dir = %self.dir.display(), files = files.len()))]
    pub fn write(&self, files: &[GalleryFile], summary: &PipelineSummary) -> Result<PublishReport> {
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let target = self.write_atomic(&file.filename, &file.contents)?;
            debug!(path = %target.display(), source = %file.source_name, "wrote gallery file");
            written.push(target);
        }

        let requirements_added =
            self.update_requirements(summary.dependencies.keys().map(String::as_str))?;
        let readme_updated =
            self.update_readme(summary.started_at.date_naive(), summary.total_published)?;

        let document = SummaryDocument {
            summary,
            files: files.iter().map(|f| f.filename.as_str()).collect(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| GalleryError::validation(format!("JSON serialization failed: {e}")))?;
        let summary_path = self.write_atomic(SUMMARY_FILE, &json)?;

        info!(
            written = written.len(),
            requirements_added = requirements_added.len(),
            readme_updated,
            "gallery output written"
        );

        Ok(PublishReport {
            files: written,
            summary_path,
            requirements_added,
            readme_updated,
        })
    }

    /// Append tracked packages from `dependencies` that `requirements.txt`
    /// does not list yet. Existing entries match by name, ignoring version
    /// specifiers and case. Returns the added names, sorted.
    pub fn update_requirements<'a>(
        &self,
        dependencies: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<String>> {
        let current = self.read_optional(REQUIREMENTS_FILE)?;
        let listed: BTreeSet<String> = current
            .lines()
            .filter_map(requirement_name)
            .map(str::to_lowercase)
            .collect();

        let added: Vec<String> = dependencies
            .into_iter()
            .map(str::to_lowercase)
            .filter(|dep| self.tracked_packages.contains(dep) && !listed.contains(dep))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if added.is_empty() {
            return Ok(added);
        }

        let mut contents = current;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        for dep in &added {
            contents.push_str(dep);
            contents.push('\n');
        }
        self.write_atomic(REQUIREMENTS_FILE, &contents)?;
        info!(added = ?added, "requirements updated");
        Ok(added)
    }

    /// Add the automated-examples notice to `README.txt` unless it already
    /// has one. Returns whether the file changed.
    pub fn update_readme(&self, date: NaiveDate, published: usize) -> Result<bool> {
        let mut contents = self.read_optional(README_FILE)?;
        if contents.contains(AUTOMATION_HEADING) {
            return Ok(false);
        }

        contents.push_str(&format!(
            r#"

{AUTOMATION_HEADING}
Some examples in this gallery are automatically generated from upstream
package documentation. These examples are prefixed with 'auto_' and include
the generation date.

Last automated update: {date}
Examples updated in this run: {published}
"#,
            date = date.format("%Y-%m-%d"),
        ));
        self.write_atomic(README_FILE, &contents)?;
        Ok(true)
    }

    fn read_optional(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(GalleryError::io(path, e)),
        }
    }

    /// Write through a temp file and rename into place.
    fn write_atomic(&self, name: &str, contents: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| GalleryError::io(&self.dir, e))?;
        let target = self.dir.join(name);
        let temp = self.dir.join(format!(".{name}.tmp"));

        std::fs::write(&temp, contents).map_err(|e| GalleryError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| GalleryError::io(&target, e))?;
        Ok(target)
    }
}

/// Package name of one `requirements.txt` line; `None` for blanks, comments
/// and pip options.
fn requirement_name(line: &str) -> Option<&str> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(line.len());
    Some(&line[..end]).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{InclusionDecision, InclusionRule};
    use crate::summary::SummaryInput;
    use chrono::Utc;
    use galleryforge_shared::{FailureReason, RunId};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "galleryforge-publish-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn artifact() -> CandidateArtifact {
        CandidateArtifact::new(
            "Map",
            "A map",
            "import sunpy.map",
            "sunpy",
            "https://docs.sunpy.org/gallery/map/plot.html",
            true,
        )
    }

    fn result(warnings: &[&str]) -> EnrichmentResult {
        EnrichmentResult {
            revised_body: "import sunpy.map\n\nm = sunpy.map.Map()".into(),
            revised_title: "Plotting an AIA map".into(),
            revised_description: "Loads and plots a map.".into(),
            category: "maps".into(),
            confidence: 0.876,
            warnings: warnings.iter().map(|w| w.to_string()).collect(),
            notes: "Added comments".into(),
            failure: None,
        }
    }

    /// One published candidate and one rejected fallback.
    fn summary() -> PipelineSummary {
        let mut first = artifact();
        first.dependencies = ["numpy", "sunpy", "mystery"].map(String::from).into();
        let second = CandidateArtifact::new("T2", "", "x = 1", "sunpy", "https://x.org/b", true);

        let mut fallback = result(&["enrichment failed"]);
        fallback.revised_title = "T2".into();
        fallback.confidence = 0.1;
        fallback.failure = Some(FailureReason::Unparseable("no block".into()));

        PipelineSummary::build(SummaryInput {
            run_id: RunId::new(),
            started_at: Utc::now(),
            source_names: &["sunpy".to_string()],
            candidates: &[first, second],
            results: &[result(&[]), fallback],
            decisions: &[
                InclusionDecision {
                    publish: true,
                    rule: InclusionRule::HighConfidence,
                },
                InclusionDecision {
                    publish: false,
                    rule: InclusionRule::Rejected,
                },
            ],
            skipped_sources: BTreeMap::new(),
        })
    }

    #[test]
    fn renders_header_and_body() {
        let text = render_gallery_file(&artifact(), &result(&[]));
        let rule = "=".repeat(40);

        assert!(text.starts_with(&format!(
            "# coding: utf-8\n\"\"\"\n{rule}\nPlotting an AIA map\n{rule}\n\nLoads and plots a map.\n"
        )));
        assert!(text.contains("scraped from sunpy documentation"));
        assert!(text.contains("Source: https://docs.sunpy.org/gallery/map/plot.html\n"));
        assert!(text.contains("Processing confidence: 0.88\n\"\"\"\n"));
        assert!(text.contains(&format!(
            "\n{SECTION_MARKER}\n# This example demonstrates sunpy functionality\n#\n"
        )));
        assert!(text.contains("# Added comments\n\nimport sunpy.map"));
        assert!(!text.contains("# Warnings:"));
        assert!(text.ends_with("m = sunpy.map.Map()"));
    }

    #[test]
    fn renders_warnings_before_body() {
        let text = render_gallery_file(&artifact(), &result(&["needs sample data", "slow"]));
        assert!(text.contains("# Warnings:\n# - needs sample data\n# - slow\n\nimport sunpy.map"));
    }

    #[test]
    fn long_titles_widen_the_rule() {
        let mut r = result(&[]);
        r.revised_title = "x".repeat(50);
        let text = render_gallery_file(&artifact(), &r);
        assert!(text.contains(&format!("\n{}\n", "=".repeat(54))));
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Plotting an AIA map!"), "plotting_an_aia_map");
        assert_eq!(slugify("Time-series: GOES  XRS"), "timeseries_goes_xrs");
        assert_eq!(slugify(&"word ".repeat(20)).len(), 30);
    }

    #[test]
    fn filename_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            gallery_filename(date, "sunpy", 3, "Plotting an AIA map"),
            "auto_20240307_sunpy_03_plotting_an_aia_map.py"
        );
        assert_eq!(
            gallery_filename(date, "pysat", 12, "x"),
            "auto_20240307_pysat_12_x.py"
        );
    }

    #[test]
    fn count_existing_matches_source_substring() {
        let dir = temp_dir();
        for name in [
            "auto_20240101_sunpy_01_a.py",
            "plot_sunpy_map.py",
            "auto_20240101_pysat_01_b.py",
        ] {
            std::fs::write(dir.join(name), "").unwrap();
        }
        let publisher = Publisher::new(&dir);
        assert_eq!(publisher.count_existing("sunpy").unwrap(), 2);
        assert_eq!(publisher.count_existing("pysat").unwrap(), 1);
        assert_eq!(publisher.count_existing("spacepy").unwrap(), 0);

        let counts = publisher.existing_counts(["sunpy", "spacepy"]).unwrap();
        assert_eq!(counts["sunpy"], 2);
        assert_eq!(counts["spacepy"], 0);
    }

    #[test]
    fn count_existing_missing_dir_is_zero() {
        let publisher = Publisher::new(temp_dir().join("absent"));
        assert_eq!(publisher.count_existing("sunpy").unwrap(), 0);
    }

    #[test]
    fn write_creates_files_and_report() {
        let dir = temp_dir().join("gallery");
        let publisher = Publisher::new(&dir).with_tracked_packages(["numpy", "sunpy"]);
        let files = vec![GalleryFile {
            filename: "auto_20240101_sunpy_01_map.py".into(),
            source_name: "sunpy".into(),
            contents: "print(1)".into(),
        }];

        let report = publisher.write(&files, &summary()).unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(std::fs::read_to_string(&report.files[0]).unwrap(), "print(1)");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report.summary_path).unwrap()).unwrap();
        assert_eq!(json["files"][0], "auto_20240101_sunpy_01_map.py");
        assert_eq!(json["total_published"], 1);
        assert!(json["run_id"].is_string());

        let decisions = json["decisions"].as_array().unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0]["index"], 1);
        assert_eq!(decisions[0]["rule"], "high_confidence");
        assert_eq!(decisions[0]["published"], true);
        assert_eq!(decisions[1]["title"], "T2");
        assert_eq!(decisions[1]["source"], "sunpy");
        assert_eq!(decisions[1]["rule"], "rejected");
        assert_eq!(decisions[1]["published"], false);
        assert_eq!(decisions[1]["failure"], "unparseable");
        assert_eq!(decisions[1]["confidence"], 0.1);

        assert_eq!(report.requirements_added, ["numpy", "sunpy"]);
        assert_eq!(
            std::fs::read_to_string(dir.join(REQUIREMENTS_FILE)).unwrap(),
            "numpy\nsunpy\n"
        );
        assert!(report.readme_updated);
        let readme = std::fs::read_to_string(dir.join(README_FILE)).unwrap();
        assert!(readme.contains("# Automated Examples"));
        assert!(readme.contains("Examples updated in this run: 1"));

        for entry in std::fs::read_dir(&dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }
    }

    #[test]
    fn requirements_keep_existing_entries() {
        let dir = temp_dir();
        std::fs::write(
            dir.join(REQUIREMENTS_FILE),
            "# gallery deps\nNumPy>=1.24\nsunpy[all]==5.1\n-r extra.txt\nscipy",
        )
        .unwrap();
        let publisher = Publisher::new(&dir)
            .with_tracked_packages(["numpy", "sunpy", "scipy", "matplotlib", "pysat"]);

        let added = publisher
            .update_requirements(["matplotlib", "numpy", "sunpy", "requests", "matplotlib"])
            .unwrap();

        assert_eq!(added, ["matplotlib"]);
        assert_eq!(
            std::fs::read_to_string(dir.join(REQUIREMENTS_FILE)).unwrap(),
            "# gallery deps\nNumPy>=1.24\nsunpy[all]==5.1\n-r extra.txt\nscipy\nmatplotlib\n"
        );

        assert!(publisher.update_requirements(["matplotlib"]).unwrap().is_empty());
    }

    #[test]
    fn untracked_packages_are_never_added() {
        let dir = temp_dir();
        let publisher = Publisher::new(&dir);
        assert!(publisher.update_requirements(["numpy"]).unwrap().is_empty());
        assert!(!dir.join(REQUIREMENTS_FILE).exists());
    }

    #[test]
    fn readme_notice_is_added_once() {
        let dir = temp_dir();
        std::fs::write(dir.join(README_FILE), "Gallery\n=======\n").unwrap();
        let publisher = Publisher::new(&dir);
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        assert!(publisher.update_readme(date, 4).unwrap());
        assert!(!publisher.update_readme(date, 9).unwrap());

        let readme = std::fs::read_to_string(dir.join(README_FILE)).unwrap();
        assert!(readme.starts_with("Gallery\n=======\n"));
        assert!(readme.contains("Last automated update: 2024-03-07\n"));
        assert!(readme.contains("Examples updated in this run: 4\n"));
        assert_eq!(readme.matches("# Automated Examples").count(), 1);
    }
}
