//! Procedure dependency resolution
//!
//! Stored procedures may call each other before their callees exist in the
//! target database, so naive alphabetical execution can fail on forward
//! references. This module extracts the call graph from the script texts,
//! orders it topologically, and executes the scripts in retry rounds: a
//! failed script is deferred to the next round, and a full round without a
//! single success fails the run.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::apply::scripts;
use crate::apply::ProcedureCounts;
use crate::db::session::SqlSession;
use crate::error::{Error, Result};
use crate::schema::types::{ScriptKind, ScriptObject};

/// Savepoint wrapped around every creation attempt so a failed statement
/// cannot poison the enclosing transaction before the next round retries it.
const ATTEMPT_SAVEPOINT: &str = "FBSYNC_ATTEMPT";

/// Apply every procedure script in `dir`, ordered by call dependencies.
pub fn apply_procedures<S: SqlSession + ?Sized>(
    session: &mut S,
    dir: &std::path::Path,
) -> Result<ProcedureCounts> {
    let mut counts = ProcedureCounts::default();

    let mut runnable = Vec::new();
    for script in scripts::load_scripts(dir, ScriptKind::Procedure)? {
        if script.text.trim().is_empty() {
            warn!(procedure = %script.name, file = %script.path.display(), "blank script, skipping");
            counts.skipped += 1;
            continue;
        }
        runnable.push(script);
    }

    if runnable.is_empty() {
        return Ok(counts);
    }

    let order = execution_order(&runnable);
    let mut rank = vec![0usize; runnable.len()];
    for (position, index) in order.iter().enumerate() {
        rank[*index] = position;
    }
    let mut paired: Vec<(usize, ScriptObject)> = runnable.into_iter().enumerate().collect();
    paired.sort_by_key(|(index, _)| rank[*index]);
    let ordered: Vec<ScriptObject> = paired.into_iter().map(|(_, script)| script).collect();

    execute_rounds(session, ordered, &mut counts)?;
    Ok(counts)
}

/// Order script indices so that callees come before their callers.
///
/// Kahn's algorithm over the callee-to-caller adjacency; the scripts arrive
/// in case-insensitive lexical order, which fixes both the initial queue
/// order and the fallback: nodes left unordered by a cycle or a dependency
/// that never resolves are appended in that same lexical order.
fn execution_order(scripts: &[ScriptObject]) -> Vec<usize> {
    let known: IndexMap<String, usize> = scripts
        .iter()
        .enumerate()
        .map(|(index, script)| (script.name.to_uppercase(), index))
        .collect();

    let mut dependencies: Vec<IndexSet<usize>> = Vec::with_capacity(scripts.len());
    for (index, script) in scripts.iter().enumerate() {
        let mut callees = IndexSet::new();
        for callee in scan_procedure_calls(&script.text) {
            if let Some(&target) = known.get(&callee.to_uppercase()) {
                if target != index {
                    callees.insert(target);
                }
            }
        }
        dependencies.push(callees);
    }

    let mut in_degree: Vec<usize> = dependencies.iter().map(IndexSet::len).collect();
    let mut callers: Vec<Vec<usize>> = vec![Vec::new(); scripts.len()];
    for (caller, callees) in dependencies.iter().enumerate() {
        for &callee in callees {
            callers[callee].push(caller);
        }
    }

    let mut queue: VecDeque<usize> = (0..scripts.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(scripts.len());
    let mut emitted = vec![false; scripts.len()];

    while let Some(index) = queue.pop_front() {
        emitted[index] = true;
        order.push(index);
        for &caller in &callers[index] {
            in_degree[caller] -= 1;
            if in_degree[caller] == 0 {
                queue.push_back(caller);
            }
        }
    }

    if order.len() < scripts.len() {
        let unresolved: Vec<&str> = (0..scripts.len())
            .filter(|&i| !emitted[i])
            .map(|i| scripts[i].name.as_str())
            .collect();
        warn!(
            procedures = ?unresolved,
            "call graph could not be fully ordered, falling back to lexical order"
        );
        order.extend((0..scripts.len()).filter(|&i| !emitted[i]));
    }

    order
}

/// Extract the identifiers named by `EXECUTE PROCEDURE` statements.
///
/// A deliberately small lexical scan instead of a pattern library: the
/// keywords are matched case-insensitively on word boundaries and the callee
/// is either a bare alphanumeric/underscore identifier or a double-quoted one
/// with `""` escapes.
pub(crate) fn scan_procedure_calls(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut calls = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !word_at(&chars, i, "EXECUTE") || (i > 0 && is_ident_char(chars[i - 1])) {
            i += 1;
            continue;
        }

        let mut j = skip_whitespace(&chars, i + "EXECUTE".len());
        if !word_at(&chars, j, "PROCEDURE") {
            i += 1;
            continue;
        }
        j = skip_whitespace(&chars, j + "PROCEDURE".len());

        match read_identifier(&chars, j) {
            Some((ident, next)) => {
                calls.push(ident);
                i = next;
            }
            None => i = j.max(i + 1),
        }
    }

    calls
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn word_at(chars: &[char], at: usize, word: &str) -> bool {
    let word_chars: Vec<char> = word.chars().collect();
    if at + word_chars.len() > chars.len() {
        return false;
    }
    for (offset, expected) in word_chars.iter().enumerate() {
        if !chars[at + offset].eq_ignore_ascii_case(expected) {
            return false;
        }
    }
    match chars.get(at + word_chars.len()) {
        Some(&next) => !is_ident_char(next),
        None => true,
    }
}

fn skip_whitespace(chars: &[char], mut at: usize) -> usize {
    while at < chars.len() && chars[at].is_whitespace() {
        at += 1;
    }
    at
}

/// Read one identifier starting at `at`; returns it unquoted together with
/// the position just past it.
fn read_identifier(chars: &[char], at: usize) -> Option<(String, usize)> {
    match chars.get(at) {
        Some('"') => {
            let mut ident = String::new();
            let mut i = at + 1;
            while i < chars.len() {
                if chars[i] == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        ident.push('"');
                        i += 2;
                        continue;
                    }
                    return if ident.is_empty() {
                        None
                    } else {
                        Some((ident, i + 1))
                    };
                }
                ident.push(chars[i]);
                i += 1;
            }
            None
        }
        Some(&c) if is_ident_char(c) => {
            let mut end = at;
            while end < chars.len() && is_ident_char(chars[end]) {
                end += 1;
            }
            Some((chars[at..end].iter().collect(), end))
        }
        _ => None,
    }
}

/// Run the ordered scripts in retry rounds until all are applied or a full
/// round makes no progress.
fn execute_rounds<S: SqlSession + ?Sized>(
    session: &mut S,
    ordered: Vec<ScriptObject>,
    counts: &mut ProcedureCounts,
) -> Result<()> {
    let mut pending: Vec<(ScriptObject, Option<String>)> =
        ordered.into_iter().map(|script| (script, None)).collect();

    while !pending.is_empty() {
        counts.rounds += 1;
        let mut deferred = Vec::new();
        let mut applied_this_round = 0;

        for (script, _) in pending {
            session.execute(&format!("SAVEPOINT {ATTEMPT_SAVEPOINT}"))?;
            match session.execute(script.text.trim()) {
                Ok(()) => {
                    info!(procedure = %script.name, round = counts.rounds, "procedure applied");
                    counts.applied += 1;
                    applied_this_round += 1;
                }
                Err(error) => {
                    session.execute(&format!("ROLLBACK TO SAVEPOINT {ATTEMPT_SAVEPOINT}"))?;
                    debug!(procedure = %script.name, %error, "procedure deferred to next round");
                    deferred.push((script, Some(error.to_string())));
                }
            }
        }

        if applied_this_round == 0 {
            let names: Vec<String> = deferred
                .iter()
                .map(|(script, _)| script.name.clone())
                .collect();
            let cause = deferred
                .iter()
                .find_map(|(_, error)| error.clone())
                .unwrap_or_default();
            return Err(Error::Stall {
                pending: names,
                cause,
            });
        }

        pending = deferred;
    }

    Ok(())
}
