//! Post-Parse Validation
//!
//! Enforces required flags (including `RequiredIf` predicates), queues
//! secure-input requests for unset secure flags, and walks the flag
//! dependency graph: iterative depth-first with a visited set, a configured
//! depth cap, and cycle detection that reports each distinct cycle exactly
//! once. An absent optional dependency is a warning; an absent required one
//! is an error.

use std::collections::HashSet;

use crate::errors::ParseError;
use crate::parser::Parser;
use crate::secure::SecureRequest;
use crate::symbols::registry::split_key;

pub(crate) fn run(parser: &mut Parser) {
    let keys: Vec<String> = parser.flags.keys().cloned().collect();
    let mut reported_cycles: HashSet<String> = HashSet::new();

    for key in &keys {
        let Some(flag_rc) = parser.flag_by_key(key) else {
            continue;
        };
        let (_, path) = split_key(key);
        // Command-scoped flags only matter when their command was observed.
        if !path.is_empty() && !parser.observed_commands.contains(path) {
            continue;
        }

        let (name, required, required_if, position, secure, has_deps) = {
            let f = flag_rc.borrow();
            (
                f.name.clone(),
                f.required,
                f.required_if.clone(),
                f.position,
                f.secure.clone(),
                !f.depends_on.is_empty(),
            )
        };
        let set = parser.options.contains_key(key);

        if let Some(predicate) = required_if {
            if !set {
                let (needed, message) = predicate(parser);
                if needed {
                    parser.errors.push(ParseError::RequiredIf { name, message });
                }
            }
        } else if required && !set {
            if let Some(prompt) = secure {
                parser.secure_queue.push(SecureRequest {
                    flag_key: key.clone(),
                    prompt: prompt.prompt,
                });
            } else if let Some(position) = position {
                parser
                    .errors
                    .push(ParseError::RequiredPositionalMissing { name, position });
            } else {
                parser.errors.push(ParseError::RequiredFlagMissing { name });
            }
        }

        if set && has_deps {
            walk_dependencies(parser, key, &mut reported_cycles);
        }
    }
}

/// Depth-first walk from one set flag through its dependency edges.
fn walk_dependencies(parser: &mut Parser, start_key: &str, reported_cycles: &mut HashSet<String>) {
    let start_name = match parser.flag_by_key(start_key) {
        Some(f) => f.borrow().name.clone(),
        None => return,
    };

    let mut visited: HashSet<String> = HashSet::new();
    let mut depth_reported = false;
    // (key, depth, names on the current path)
    let mut stack: Vec<(String, usize, Vec<String>)> =
        vec![(start_key.to_string(), 0, vec![start_name.clone()])];

    while let Some((key, depth, trail)) = stack.pop() {
        if depth > parser.max_dependency_depth {
            if !depth_reported {
                parser.errors.push(ParseError::DependencyDepthExceeded {
                    name: start_name.clone(),
                    max_depth: parser.max_dependency_depth,
                });
                depth_reported = true;
            }
            continue;
        }
        if !visited.insert(key.clone()) {
            continue;
        }

        let Some(flag_rc) = parser.flag_by_key(&key) else {
            continue;
        };
        let (holder_name, depends) = {
            let f = flag_rc.borrow();
            (f.name.clone(), f.depends_on.clone())
        };
        let (_, holder_path) = split_key(&key);

        for (dep_name, allowed) in depends {
            let dep_key = parser.flags.lookup_long(&dep_name, holder_path);
            let Some(dep_key) = dep_key else {
                parser.warnings.push(ParseError::DependencyNotFound {
                    name: holder_name.clone(),
                    depends_on: dep_name.clone(),
                });
                continue;
            };

            if trail.contains(&dep_name) {
                let cycle = cycle_signature(&trail, &dep_name);
                if reported_cycles.insert(cycle.clone()) {
                    parser.errors.push(ParseError::CircularDependency { cycle });
                }
                continue;
            }

            let dep_set = parser.options.contains_key(&dep_key);
            let dep_required = parser
                .flag_by_key(&dep_key)
                .map(|f| f.borrow().required)
                .unwrap_or(false);

            if !dep_set {
                let diagnostic = ParseError::DependencyNotFound {
                    name: holder_name.clone(),
                    depends_on: dep_name.clone(),
                };
                if dep_required {
                    parser.errors.push(diagnostic);
                } else {
                    parser.warnings.push(diagnostic);
                }
            } else if !allowed.is_empty() {
                let value = parser.options.get(&dep_key).cloned().unwrap_or_default();
                let satisfied = value
                    .split('|')
                    .any(|part| allowed.iter().any(|a| a.eq_ignore_ascii_case(part)));
                if !satisfied {
                    parser.errors.push(ParseError::DependencyValueNotSpecified {
                        name: holder_name.clone(),
                        depends_on: dep_name.clone(),
                        allowed: allowed.join(", "),
                    });
                }
            }

            let mut next_trail = trail.clone();
            next_trail.push(dep_name.clone());
            stack.push((dep_key, depth + 1, next_trail));
        }
    }
}

/// Canonical form of a cycle so `a→b→a` and `b→a→b` collapse to one report:
/// the member list starting at the cycle entry is rotated to its smallest
/// element.
fn cycle_signature(trail: &[String], closing: &str) -> String {
    let start = trail.iter().position(|n| n == closing).unwrap_or(0);
    let members: Vec<&str> = trail[start..].iter().map(|s| s.as_str()).collect();
    if members.is_empty() {
        return closing.to_string();
    }
    let min_index = members
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| **name)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated: Vec<&str> = Vec::with_capacity(members.len());
    for i in 0..members.len() {
        rotated.push(members[(min_index + i) % members.len()]);
    }
    rotated.join(" -> ")
}
