//! Streaming evaluation: pull one record from the walker, run the prepared
//! tree against the registry, yield it on a match.

use crate::Finder;
use anyhow::Result;
use mdseek_syntax::Expr;
use mdwalk::{FileRecord, WalkOptions, Walker};
use tracing::debug;

use crate::value::CastValue;

/// Lazy stream of matching files. At most one file is in flight; dropping
/// the iterator stops the walk at the next directory or file read. The
/// stream fuses after the first error.
pub struct Matches<'a> {
    finder: &'a Finder,
    walker: Walker,
    expr: Expr<CastValue>,
    case_sensitive: bool,
    done: bool,
}

impl std::fmt::Debug for Matches<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matches")
            .field("case_sensitive", &self.case_sensitive)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'a> Matches<'a> {
    pub(crate) fn new(
        finder: &'a Finder,
        expr: Expr<CastValue>,
        dir: impl Into<std::path::PathBuf>,
        case_sensitive: bool,
        options: WalkOptions,
    ) -> Self {
        Self {
            finder,
            walker: Walker::new(dir, options),
            expr,
            case_sensitive,
            done: false,
        }
    }
}

impl Iterator for Matches<'_> {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let record = match self.walker.next()? {
                Ok(record) => record,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error.into()));
                }
            };
            let finder = self.finder;
            let case_sensitive = self.case_sensitive;
            let verdict = self
                .expr
                .evaluate(&mut |leaf| finder.match_leaf(leaf, &record, case_sensitive));
            match verdict {
                Ok(true) => {
                    debug!(path = %record.path, "file matched");
                    return Some(Ok(record));
                }
                Ok(false) => continue,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }
    }
}
