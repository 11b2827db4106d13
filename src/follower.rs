//! Social-graph helpers over the `follow` label, available on any node reference.

use crate::{
    entity::Model,
    errors::KvGraphError,
    graph::Graph,
    node::NodeRef,
    query::Query,
    relationship::Relationship,
    store::KeyValueStore,
    types::Attributes,
};

pub const FOLLOW: &str = "follow";

pub trait Follower: NodeRef {
    fn follow<S, N>(&self, graph: &Graph<S>, other: &N) -> Result<Relationship, KvGraphError>
    where
        S: KeyValueStore,
        N: NodeRef + ?Sized,
    {
        graph.create_relationship(FOLLOW, self, other, Attributes::new())
    }

    /// Destroys the follow relationship to `other`; returns whether one existed.
    fn unfollow<S, N>(&self, graph: &Graph<S>, other: &N) -> Result<bool, KvGraphError>
    where
        S: KeyValueStore,
        N: NodeRef + ?Sized,
    {
        let found: Option<Relationship> = self.following(graph).relationships().find(other)?;
        match found {
            Some(mut relationship) => {
                graph.destroy(&mut relationship)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn followers<'g, S: KeyValueStore>(&self, graph: &'g Graph<S>) -> Query<'g, S> {
        graph.query(self).incoming(FOLLOW)
    }

    fn following<'g, S: KeyValueStore>(&self, graph: &'g Graph<S>) -> Query<'g, S> {
        graph.query(self).outgoing(FOLLOW)
    }

    /// Nodes that both follow and are followed by this one.
    fn friends<S: KeyValueStore, M: Model>(&self, graph: &Graph<S>) -> Result<Vec<M>, KvGraphError> {
        self.followers(graph).intersect(&self.following(graph))
    }

    fn is_following<S, N>(&self, graph: &Graph<S>, other: &N) -> Result<bool, KvGraphError>
    where
        S: KeyValueStore,
        N: NodeRef + ?Sized,
    {
        self.following(graph).contains(other)
    }

    fn is_followed_by<S, N>(&self, graph: &Graph<S>, other: &N) -> Result<bool, KvGraphError>
    where
        S: KeyValueStore,
        N: NodeRef + ?Sized,
    {
        self.followers(graph).contains(other)
    }

    fn followers_count<S: KeyValueStore>(&self, graph: &Graph<S>) -> Result<usize, KvGraphError> {
        self.followers(graph).size()
    }

    fn following_count<S: KeyValueStore>(&self, graph: &Graph<S>) -> Result<usize, KvGraphError> {
        self.following(graph).size()
    }
}

impl<T: NodeRef + ?Sized> Follower for T {}
