use super::pattern;
use crate::{resource::Resource, url::FileUrl, Result};
use camino::{Utf8Path, Utf8PathBuf};

const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Rewrites a local pattern into what the glob crate accepts. `**` is only
/// recursive as a whole path component, elsewhere it is the same as `*`, and
/// a trailing `**` matches the entries below it rather than just directories.
fn normalize(path: &str) -> String {
    let mut segments: Vec<String> = path
        .split('/')
        .map(|seg| {
            let mut seg = seg.to_owned();
            if seg != "**" {
                while seg.contains("**") {
                    seg = seg.replace("**", "*");
                }
            }
            seg
        })
        .collect();

    if segments.last().map_or(false, |s| s == "**") {
        segments.push("*".to_owned());
    }

    segments.join("/")
}

/// The pattern for hidden entries below a recursive wildcard, which the
/// primary pattern never matches
fn hidden_pattern(path: &str) -> Option<String> {
    if !path.contains("**") {
        return None;
    }

    let path = path.trim_end_matches('/');
    Some(if path.ends_with("/**") || path == "**" {
        format!("{path}/.*")
    } else {
        format!("{path}/**/.*")
    })
}

/// `.` and `..` are matched by patterns starting with a dot
#[inline]
fn is_special(path: &Utf8Path) -> bool {
    matches!(path.as_str().rsplit('/').next(), Some(".") | Some(".."))
}

/// Runs a single glob, returning the matches in sorted order
fn glob(pattern: &str) -> Result<Vec<Utf8PathBuf>> {
    let mut matched = Vec::new();

    for entry in glob::glob_with(pattern, MATCH_OPTIONS)? {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                tracing::debug!(error = %err, "unable to read directory entry");
                continue;
            }
        };

        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) if !is_special(&path) => matched.push(path),
            Ok(_) => {}
            Err(path) => {
                tracing::debug!(path = %path.display(), "skipping non utf-8 path");
            }
        }
    }

    matched.sort();
    Ok(matched)
}

/// Iterates over the files and directories matching a local path, which may
/// contain wildcards
pub struct FileWildcardIterator {
    url: FileUrl,
    ignore_symlinks: bool,
    matches: Option<std::vec::IntoIter<Resource>>,
}

impl FileWildcardIterator {
    pub fn new(url: FileUrl, ignore_symlinks: bool) -> Self {
        let path = pattern::compress_wildcards(url.path.as_str()).into_owned();

        Self {
            url: FileUrl {
                path: Utf8PathBuf::from(path),
            },
            ignore_symlinks,
            matches: None,
        }
    }

    #[inline]
    pub fn url(&self) -> &FileUrl {
        &self.url
    }

    pub async fn next(&mut self) -> Result<Option<Resource>> {
        if self.matches.is_none() {
            let matched = self.expand()?;
            self.matches = Some(matched.into_iter());
        }

        Ok(self.matches.as_mut().and_then(|m| m.next()))
    }

    pub async fn collect(mut self) -> Result<Vec<Resource>> {
        let mut all = Vec::new();
        while let Some(res) = self.next().await? {
            all.push(res);
        }
        Ok(all)
    }

    fn expand(&self) -> Result<Vec<Resource>> {
        // Files named '-' can't be matched as that string means stdio
        if self.url.is_stream() {
            return Ok(vec![Resource::FileObject(self.url.clone())]);
        }

        let path = self.url.path.as_str();
        let dirs_only = path.ends_with('/');

        let mut candidates = glob(&normalize(path))?;
        if let Some(hidden) = hidden_pattern(path) {
            candidates.extend(glob(&normalize(&hidden))?);
        }

        let mut seen = std::collections::HashSet::new();
        let mut resources = Vec::new();

        for candidate in candidates {
            if !seen.insert(candidate.clone()) {
                continue;
            }

            let is_symlink = candidate
                .symlink_metadata()
                .map(|md| md.file_type().is_symlink())
                .unwrap_or(false);

            // Symlinks are followed unless they point to a directory or we've
            // been told to ignore them
            if is_symlink && (candidate.is_dir() || self.ignore_symlinks) {
                tracing::warn!(path = %candidate, "skipping symlink");
                continue;
            }

            let is_dir = candidate.is_dir();

            // Intermediate directories are not yielded for `dir/**`, to be
            // consistent with cloud expansion
            if path.ends_with("**") && (is_dir || !candidate.exists()) {
                continue;
            }

            if dirs_only && !is_dir {
                continue;
            }

            let url = FileUrl {
                path: Utf8PathBuf::from(candidate.as_str().trim_end_matches('/')),
            };

            resources.push(if is_dir {
                Resource::FileDirectory(url)
            } else {
                Resource::FileObject(url)
            });
        }

        Ok(resources)
    }
}
