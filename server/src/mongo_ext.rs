use std::ops::{Deref, DerefMut};

use bson::oid::ObjectId;
use mongodb::ClientSession;
use serde::de::DeserializeOwned;

use crate::error::Error;

pub struct Collection<T>(pub mongodb::Collection<T>);

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Collection<T> {
    type Target = mongodb::Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Collection<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> From<mongodb::Collection<T>> for Collection<T> {
    fn from(value: mongodb::Collection<T>) -> Self {
        Self(value)
    }
}

impl<T> Collection<T>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    pub async fn find_one_by_id(&self, id: ObjectId) -> Result<Option<T>, Error> {
        self.find_one(
            bson::doc! {
                "_id": id
            },
            None,
        )
        .await
        .map_err(Into::into)
    }

    pub async fn find_one_by_id_with_session(
        &self,
        id: ObjectId,
        session: &mut ClientSession,
    ) -> Result<Option<T>, Error> {
        self.find_one_with_session(
            bson::doc! {
                "_id": id
            },
            None,
            session,
        )
        .await
        .map_err(Into::into)
    }

    pub async fn update_one_by_id(
        &self,
        id: ObjectId,
        update: impl Into<mongodb::options::UpdateModifications>,
    ) -> Result<mongodb::results::UpdateResult, Error> {
        self.update_one(
            bson::doc! {
                "_id": id
            },
            update,
            None,
        )
        .await
        .map_err(Into::into)
    }

    pub async fn update_one_by_id_with_session(
        &self,
        id: ObjectId,
        update: impl Into<mongodb::options::UpdateModifications>,
        session: &mut ClientSession,
    ) -> Result<mongodb::results::UpdateResult, Error> {
        self.update_one_with_session(
            bson::doc! {
                "_id": id
            },
            update,
            None,
            session,
        )
        .await
        .map_err(Into::into)
    }

    pub async fn delete_one_by_id(&self, id: ObjectId) -> Result<u64, Error> {
        self.delete_one(
            bson::doc! {
                "_id": id
            },
            None,
        )
        .await
        .map(|it| it.deleted_count)
        .map_err(Into::into)
    }
}
