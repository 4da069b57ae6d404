//! Executor that forwards every operation to a remote service

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{check_value_type, named_tuple_type, select_type, Executor, ExecutorValue, RawValue};
use crate::error::Result;
use crate::payload::Payload;
use crate::table::ValueRef;
use crate::transport::ExecutorClient;
use crate::types::{Selection, TypeSignature};

/// An [`Executor`] backed by an [`ExecutorClient`].
///
/// Types are checked locally before a request is sent, so ill-typed
/// compositions fail without a round trip.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    client: ExecutorClient,
}

impl RemoteExecutor {
    /// Wrap a connected client.
    pub fn new(client: ExecutorClient) -> Self {
        Self { client }
    }

    /// Connect to a service at `addr`.
    pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> Result<Self> {
        Ok(Self::new(ExecutorClient::connect(addr).await?))
    }

    /// The underlying client
    pub fn client(&self) -> &ExecutorClient {
        &self.client
    }

    fn value(&self, value_ref: ValueRef, type_signature: TypeSignature) -> RemoteValue {
        RemoteValue {
            inner: Arc::new(RemoteHandle {
                value_ref,
                type_signature,
                client: self.client.clone(),
                cache: OnceCell::new(),
            }),
        }
    }
}

#[derive(Debug)]
struct RemoteHandle {
    value_ref: ValueRef,
    type_signature: TypeSignature,
    client: ExecutorClient,
    cache: OnceCell<Payload>,
}

impl Drop for RemoteHandle {
    fn drop(&mut self) {
        // Release the remote reference once the last local handle is gone
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let value_ref = self.value_ref.clone();
            runtime.spawn(async move {
                if let Err(e) = client.dispose(&value_ref).await {
                    tracing::debug!(%value_ref, error = %e, "remote dispose failed");
                }
            });
        }
    }
}

/// A value living in a remote service.
#[derive(Debug, Clone)]
pub struct RemoteValue {
    inner: Arc<RemoteHandle>,
}

impl RemoteValue {
    /// The remote reference
    pub fn value_ref(&self) -> &ValueRef {
        &self.inner.value_ref
    }
}

#[async_trait]
impl ExecutorValue for RemoteValue {
    fn type_signature(&self) -> &TypeSignature {
        &self.inner.type_signature
    }

    async fn compute(&self) -> Result<Payload> {
        let payload = self
            .inner
            .cache
            .get_or_try_init(|| self.inner.client.compute(&self.inner.value_ref))
            .await?;
        Ok(payload.clone())
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    type Value = RemoteValue;

    async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<RemoteValue> {
        let ty = check_value_type(&value, type_signature)?;
        let value_ref = self.client.create_value(value, Some(ty.clone())).await?;
        Ok(self.value(value_ref, ty))
    }

    async fn create_call(
        &self,
        function: RemoteValue,
        argument: Option<RemoteValue>,
    ) -> Result<RemoteValue> {
        let ty = function
            .type_signature()
            .call_result(argument.as_ref().map(|a| a.type_signature()))?;
        let value_ref = self
            .client
            .create_call(function.value_ref(), argument.as_ref().map(|a| a.value_ref()))
            .await?;
        Ok(self.value(value_ref, ty))
    }

    async fn create_tuple(
        &self,
        elements: Vec<(Option<String>, RemoteValue)>,
    ) -> Result<RemoteValue> {
        let ty = named_tuple_type(&elements);
        let refs = elements
            .iter()
            .map(|(n, v)| (n.clone(), v.value_ref().clone()))
            .collect();
        let value_ref = self.client.create_tuple(refs).await?;
        Ok(self.value(value_ref, ty))
    }

    async fn create_selection(
        &self,
        source: RemoteValue,
        selection: Selection,
    ) -> Result<RemoteValue> {
        let ty = select_type(source.type_signature(), &selection)?;
        let value_ref = self
            .client
            .create_selection(source.value_ref(), selection)
            .await?;
        Ok(self.value(value_ref, ty))
    }
}
