//! Static edge type validation. Runs once, at
//! [`crate::builder::GraphBuilder::build`] time — never at run time. Walks
//! the wired graph breadth-first from its start node and checks that every
//! edge's producer output type is [`assignable`] to the consumer's declared
//! input type.

use crate::error::PocketError;
use crate::node::Node;
use crate::types::assignable;
use std::collections::{HashMap, HashSet, VecDeque};

pub(crate) fn validate(nodes: &HashMap<String, Node>, start: &str) -> Result<(), PocketError> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start.to_string());
    visited.insert(start.to_string());

    while let Some(current_name) = queue.pop_front() {
        let Some(current) = nodes.get(&current_name) else {
            continue;
        };

        for next_name in current.successors().values() {
            let Some(next) = nodes.get(next_name) else {
                continue;
            };

            if !assignable(current.output_type(), next.input_type()) {
                return Err(PocketError::TypeMismatch {
                    producer: current_name.clone(),
                    producer_type: current.output_type().clone(),
                    consumer: next_name.clone(),
                    consumer_type: next.input_type().clone(),
                });
            }

            if visited.insert(next_name.clone()) {
                queue.push_back(next_name.clone());
            }
        }
    }

    Ok(())
}
