//! Query plan JOIN operations

use super::types::*;
use super::QueryPlan;

impl QueryPlan {
    /// Add a join on a single column equality
    pub fn join(mut self, join_type: JoinType, relation: impl Into<Relation>, left: &str, right: &str) -> Self {
        self.joins.push(Join {
            join_type,
            relation: relation.into(),
            on: vec![(left.into(), right.into())],
        });
        self
    }

    /// Add INNER JOIN
    pub fn inner_join(self, relation: impl Into<Relation>, left: &str, right: &str) -> Self {
        self.join(JoinType::Inner, relation, left, right)
    }

    /// Add LEFT OUTER JOIN
    pub fn left_join(self, relation: impl Into<Relation>, left: &str, right: &str) -> Self {
        self.join(JoinType::Left, relation, left, right)
    }

    /// Add RIGHT OUTER JOIN
    pub fn right_join(self, relation: impl Into<Relation>, left: &str, right: &str) -> Self {
        self.join(JoinType::Right, relation, left, right)
    }

    /// Add a join with several column equalities
    pub fn join_on(mut self, join_type: JoinType, relation: impl Into<Relation>, on: Vec<(&str, &str)>) -> Self {
        self.joins.push(Join {
            join_type,
            relation: relation.into(),
            on: on
                .into_iter()
                .map(|(left, right)| (left.into(), right.into()))
                .collect(),
        });
        self
    }
}
