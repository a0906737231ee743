use std::collections::BTreeSet;

use crate::error::GenerateError;

/// Walk a single-`dep` chain from `start` until `next` yields `None`,
/// returning the visited nodes closest-first. Revisiting a node fails with
/// [`GenerateError::CycleDetected`] carrying the sub-path from the first
/// occurrence of the repeated node.
pub fn resolve<F>(start: &str, mut next: F) -> Result<Vec<String>, GenerateError>
where
    F: FnMut(&str) -> Result<Option<String>, GenerateError>,
{
    let mut chain: Vec<String> = Vec::new();
    let mut current = start.to_string();

    loop {
        if let Some(at) = chain.iter().position(|seen| *seen == current) {
            return Err(GenerateError::CycleDetected {
                path: chain.split_off(at),
            });
        }

        let following = next(&current)?;
        chain.push(current);
        match following {
            Some(node) => current = node,
            None => return Ok(chain),
        }
    }
}

/// Transitive closure over a DAG-shaped dependency structure: iterative
/// depth-first post-order, children before parents. Cycles are reported as
/// the active path suffix starting at the re-entered node.
pub fn closure<F>(starts: &[String], mut children: F) -> Result<Vec<String>, GenerateError>
where
    F: FnMut(&str) -> Result<Vec<String>, GenerateError>,
{
    enum Frame {
        Enter(String),
        Exit(String),
    }

    let mut visited = BTreeSet::new();
    let mut active: Vec<String> = Vec::new();
    let mut order = Vec::new();
    let mut stack: Vec<Frame> = starts.iter().rev().cloned().map(Frame::Enter).collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if visited.contains(&node) {
                    continue;
                }
                if let Some(at) = active.iter().position(|seen| *seen == node) {
                    return Err(GenerateError::CycleDetected {
                        path: active.split_off(at),
                    });
                }

                active.push(node.clone());
                let kids = children(&node)?;
                stack.push(Frame::Exit(node));
                for kid in kids.into_iter().rev() {
                    stack.push(Frame::Enter(kid));
                }
            }
            Frame::Exit(node) => {
                active.pop();
                visited.insert(node.clone());
                order.push(node);
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_next<'a>(
        edges: &'a [(&'a str, &'a str)],
    ) -> impl FnMut(&str) -> Result<Option<String>, GenerateError> + 'a {
        move |node| {
            Ok(edges
                .iter()
                .find(|(from, _)| *from == node)
                .map(|(_, to)| to.to_string()))
        }
    }

    #[test]
    fn resolve_returns_nodes_closest_first() {
        let chain = resolve("a", chain_next(&[("a", "b"), ("b", "c")])).unwrap();
        assert_eq!(chain, ["a", "b", "c"]);
    }

    #[test]
    fn resolve_reports_the_cycle_sub_path() {
        let error = resolve("a", chain_next(&[("a", "b"), ("b", "c"), ("c", "a")])).unwrap_err();
        assert_eq!(
            error,
            GenerateError::CycleDetected {
                path: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            },
        );

        // The reported path starts at the first repeated node, not the walk
        // start.
        let error = resolve("a", chain_next(&[("a", "b"), ("b", "c"), ("c", "b")])).unwrap_err();
        assert_eq!(
            error,
            GenerateError::CycleDetected {
                path: vec!["b".to_string(), "c".to_string()],
            },
        );
    }

    #[test]
    fn closure_visits_children_before_parents() {
        let order = closure(&["a".to_string()], |node| {
            Ok(match node {
                "a" => vec!["b".to_string(), "c".to_string()],
                "b" => vec!["c".to_string()],
                _ => Vec::new(),
            })
        })
        .unwrap();
        assert_eq!(order, ["c", "b", "a"]);
    }

    #[test]
    fn closure_detects_cycles_through_shared_nodes() {
        let error = closure(&["a".to_string()], |node| {
            Ok(match node {
                "a" => vec!["b".to_string()],
                "b" => vec!["a".to_string()],
                _ => Vec::new(),
            })
        })
        .unwrap_err();
        assert_eq!(
            error,
            GenerateError::CycleDetected {
                path: vec!["a".to_string(), "b".to_string()],
            },
        );
    }
}
