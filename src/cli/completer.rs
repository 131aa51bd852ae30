//! completer.rs
//!
//! Tab completion for the REPL.
//!
//! `CompletionTree` is rebuilt from scratch for every index list the poller
//! publishes and is never mutated afterwards. The line editor reads it
//! through `SharedCompletionTree`, an `ArcSwap` handle: the refresh loop
//! stores a whole new tree in one pointer swap, so a keystroke sees either
//! the previous tree or the new one, and reads never take a lock.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::poller::IndexList;

/// Suggested paths for one HTTP verb.
struct VerbPaths {
    verb: &'static str,
    /// Cluster level endpoints, no index in the path.
    cluster: &'static [&'static str],
    /// Appended to a single index: `<index>/<suffix>`.
    index: &'static [&'static str],
    /// Operators relating two indices: `<source>/<op>/<target>`.
    pair: &'static [&'static str],
}

const CAT_PATHS: &[&str] = &[
    "_cat/indices",
    "_cat/pending_tasks",
    "_cat/repositories",
    "_cat/segments",
    "_cat/health",
    "_cat/nodes",
    "_cat/allocation",
    "_cat/shards",
    "_cat/recovery",
    "_cat/fielddata",
    "_cat/nodeattrs",
    "_cat/count",
    "_cat/plugins",
    "_cat/templates",
    "_cat/aliases",
    "_cluster/health",
    "_cluster/state",
    "_cluster/settings",
    "_cluster/stats",
    "_nodes",
    "_nodes/stats",
    "_aliases",
    "_mapping",
    "_settings",
    "_stats",
    "_search",
    "_tasks",
    "_template",
    "_snapshot",
];

const VERB_PATHS: &[VerbPaths] = &[
    VerbPaths {
        verb: "GET",
        cluster: CAT_PATHS,
        index: &[
            "_search", "_count", "_mapping", "_settings", "_stats", "_alias", "_segments",
            "_recovery",
        ],
        pair: &[],
    },
    VerbPaths {
        verb: "PUT",
        cluster: &["_cluster/settings", "_template", "_snapshot"],
        index: &["_mapping", "_settings", "_alias"],
        pair: &["_alias", "_shrink", "_split", "_clone"],
    },
    VerbPaths {
        verb: "POST",
        cluster: &[
            "_search",
            "_refresh",
            "_flush",
            "_forcemerge",
            "_cache/clear",
            "_reindex",
            "_aliases",
        ],
        index: &[
            "_search", "_count", "_refresh", "_flush", "_forcemerge", "_open", "_close",
            "_cache/clear", "_doc",
        ],
        pair: &["_shrink", "_split", "_clone"],
    },
    VerbPaths {
        verb: "HEAD",
        cluster: &[],
        index: &[],
        pair: &[],
    },
    VerbPaths {
        verb: "DELETE",
        cluster: &["_template", "_snapshot"],
        index: &["_alias"],
        pair: &["_alias"],
    },
];

const SET_VERB: &str = "set";
const SET_OPTIONS: &[&str] = &["user", "pass", "host", "port", "verbose"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNode {
    pub token: String,
    pub children: Vec<CompletionNode>,
}

impl CompletionNode {
    fn leaf(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            children: Vec::new(),
        }
    }

    fn branch(token: impl Into<String>, children: Vec<CompletionNode>) -> Self {
        Self {
            token: token.into(),
            children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTree {
    roots: Vec<CompletionNode>,
}

impl Default for CompletionTree {
    fn default() -> Self {
        Self::with_indices(&[])
    }
}

impl CompletionTree {
    pub fn with_indices(indices: &[String]) -> Self {
        let mut roots: Vec<CompletionNode> = VERB_PATHS
            .iter()
            .map(|v| CompletionNode::branch(v.verb, verb_suggestions(v, indices)))
            .collect();

        roots.push(CompletionNode::branch(
            SET_VERB,
            SET_OPTIONS.iter().copied().map(CompletionNode::leaf).collect(),
        ));

        Self { roots }
    }

    /// Verbs match case-insensitively, like the input parser.
    pub fn get(&self, verb: &str) -> Option<&CompletionNode> {
        self.roots.iter().find(|n| n.token.eq_ignore_ascii_case(verb))
    }

    /// Candidates for the word under the cursor, with the byte offset where
    /// that word starts. A leading `/` on a path is not part of the word.
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let Some(line) = line.get(..pos) else {
            return (pos, Vec::new());
        };

        let word_start = line.rfind(char::is_whitespace).map_or(0, |i| i + 1);
        let mut partial = &line[word_start..];
        let mut start = word_start;
        if let Some(stripped) = partial.strip_prefix('/') {
            partial = stripped;
            start += 1;
        }

        let mut tokens = line[..word_start]
            .split_whitespace()
            .map(|t| t.trim_start_matches('/'));
        let mut level: &[CompletionNode] = match tokens.next() {
            None => self.roots.as_slice(),
            Some(verb) => match self.get(verb) {
                Some(node) => &node.children,
                None => return (start, Vec::new()),
            },
        };
        for token in tokens {
            match level.iter().find(|n| n.token == token) {
                Some(node) => level = &node.children,
                None => return (start, Vec::new()),
            }
        }

        let at_root = word_start == 0 || line[..word_start].trim().is_empty();
        let candidates = level
            .iter()
            .filter(|n| {
                if at_root {
                    n.token.to_ascii_lowercase().starts_with(&partial.to_ascii_lowercase())
                } else {
                    n.token.starts_with(partial)
                }
            })
            .map(|n| n.token.clone())
            .collect();

        (start, candidates)
    }
}

fn verb_suggestions(paths: &VerbPaths, indices: &[String]) -> Vec<CompletionNode> {
    let mut out: Vec<CompletionNode> = paths
        .cluster
        .iter()
        .copied()
        .map(CompletionNode::leaf)
        .collect();

    for index in indices {
        out.push(CompletionNode::leaf(index.as_str()));
        for suffix in paths.index {
            out.push(CompletionNode::leaf(format!("{index}/{suffix}")));
        }
    }

    for op in paths.pair {
        for source in indices {
            for target in indices.iter().filter(|t| *t != source) {
                out.push(CompletionNode::leaf(format!("{source}/{op}/{target}")));
            }
        }
    }

    out
}

/// Single-writer, multi-reader handle on the active completion tree.
#[derive(Clone)]
pub struct SharedCompletionTree {
    current: Arc<ArcSwap<CompletionTree>>,
}

impl Default for SharedCompletionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedCompletionTree {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(CompletionTree::default())),
        }
    }

    pub fn load(&self) -> Arc<CompletionTree> {
        self.current.load_full()
    }

    pub fn replace(&self, tree: CompletionTree) {
        self.current.store(Arc::new(tree));
    }
}

/// Rebuilds the tree for every published index list, empty ones included,
/// until the poller closes the channel.
pub async fn refresh_completer(mut indices: mpsc::Receiver<IndexList>, tree: SharedCompletionTree) {
    while let Some(list) = indices.recv().await {
        tree.replace(CompletionTree::with_indices(&list));
        debug!(indices = list.len(), "completion tree refreshed");
    }
    debug!("index channel closed, completion refresh stopped");
}

/// rustyline helper bound to the shared tree.
pub struct IndexCompleter {
    tree: SharedCompletionTree,
}

impl IndexCompleter {
    pub fn new(tree: SharedCompletionTree) -> Self {
        Self { tree }
    }
}

impl Completer for IndexCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let (start, candidates) = self.tree.load().complete(line, pos);
        trace!(pos, found = candidates.len(), "completing");

        let pairs = candidates
            .into_iter()
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for IndexCompleter {
    type Hint = String;
}

impl Highlighter for IndexCompleter {}

impl Validator for IndexCompleter {}

impl Helper for IndexCompleter {}
