//! Deferred IO handles.
//!
//! An [`IoPromise`] pairs one component with a typed mapper over its raw
//! return; awaiting it drives a single-element render. Promises combine
//! into an [`IoGroupPromise`] for batched renders; exclusive promises
//! (full-screen components like `CONFIRM`) can never join a group.

use crate::client::{GroupValidator, IoClient, RenderMember, ReturnCheck};
use crate::component::IoComponent;
use crate::error::IoError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::IntoFuture;
use std::sync::Arc;

/// `raw return -> typed value`.
#[doc(hidden)]
pub type ValueMapper<T> = Arc<dyn Fn(Value) -> Result<T, IoError> + Send + Sync>;

pub(crate) struct PromiseParts<T> {
    pub(crate) component: Arc<IoComponent>,
    pub(crate) mapper: ValueMapper<T>,
    pub(crate) check: Option<ReturnCheck>,
    pub(crate) exclusive: bool,
}

/// A deferred single-component render.
///
/// Created by the `io` methods, consumed by exactly one await — directly or
/// inside a group.
pub struct IoPromise<T> {
    pub(crate) client: Arc<IoClient>,
    pub(crate) parts: Result<PromiseParts<T>, IoError>,
}

impl<T: Send + 'static> IoPromise<T> {
    pub(crate) fn new(
        client: Arc<IoClient>,
        component: Result<IoComponent, IoError>,
        mapper: ValueMapper<T>,
    ) -> Self {
        let parts = component.map(|component| {
            let exclusive = component.is_exclusive();
            PromiseParts {
                component: Arc::new(component),
                mapper,
                check: None,
                exclusive,
            }
        });
        Self { client, parts }
    }

    /// Attach a post-return validator. A non-empty message rejects the
    /// batch and re-renders with the message surfaced to the operator.
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        if let Ok(parts) = &mut self.parts {
            let mapper = parts.mapper.clone();
            let check: ReturnCheck = Arc::new(move |raw: &Value| match mapper(raw.clone()) {
                Ok(typed) => validator(&typed),
                Err(e) => Some(e.to_string()),
            });
            parts.check = Some(check);
        }
        self
    }

    /// Mark this promise exclusive: it renders full-screen and can no
    /// longer be grouped.
    pub fn exclusive(mut self) -> ExclusiveIoPromise<T> {
        if let Ok(parts) = &mut self.parts {
            parts.exclusive = true;
        }
        ExclusiveIoPromise { inner: self }
    }
}

impl<T: Send + 'static> IntoFuture for IoPromise<T> {
    type Output = Result<T, IoError>;
    type IntoFuture = BoxFuture<'static, Result<T, IoError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let parts = self.parts?;
            let member = RenderMember {
                component: parts.component,
                check: parts.check,
            };
            let mut values = self.client.render_components(vec![member], None).await?;
            let raw = values.pop().ok_or_else(|| {
                IoError::ProtocolMismatch("render resolved with no values".to_string())
            })?;
            (parts.mapper)(raw)
        })
    }
}

/// An [`IoPromise`] that must render on its own.
pub struct ExclusiveIoPromise<T> {
    inner: IoPromise<T>,
}

impl<T: Send + 'static> IntoFuture for ExclusiveIoPromise<T> {
    type Output = Result<T, IoError>;
    type IntoFuture = BoxFuture<'static, Result<T, IoError>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner.into_future()
    }
}

#[doc(hidden)]
pub struct GroupPart {
    pub(crate) member: RenderMember,
    pub(crate) exclusive: bool,
}

#[doc(hidden)]
pub type GroupMapper<O> = Box<dyn FnOnce(Vec<Value>) -> Result<O, IoError> + Send>;

/// One element of a group tuple.
pub trait IoGroupMember {
    type Value;

    #[doc(hidden)]
    fn into_group_part(self) -> Result<(GroupPart, ValueMapper<Self::Value>), IoError>;
}

impl<T: Send + 'static> IoGroupMember for IoPromise<T> {
    type Value = T;

    fn into_group_part(self) -> Result<(GroupPart, ValueMapper<T>), IoError> {
        let parts = self.parts?;
        Ok((
            GroupPart {
                member: RenderMember {
                    component: parts.component,
                    check: parts.check,
                },
                exclusive: parts.exclusive,
            },
            parts.mapper,
        ))
    }
}

impl<T: Send + 'static> IoGroupMember for ExclusiveIoPromise<T> {
    type Value = T;

    fn into_group_part(self) -> Result<(GroupPart, ValueMapper<T>), IoError> {
        let (mut part, mapper) = self.inner.into_group_part()?;
        part.exclusive = true;
        Ok((part, mapper))
    }
}

/// An ordered tuple of group-eligible promises.
pub trait IoGroupItems {
    type Output;

    #[doc(hidden)]
    fn into_group_parts(self) -> Result<(Vec<GroupPart>, GroupMapper<Self::Output>), IoError>;
}

macro_rules! impl_group_items {
    ($(($member:ident, $item:ident, $part:ident, $mapper:ident)),+) => {
        impl<$($member: IoGroupMember),+> IoGroupItems for ($($member,)+)
        where
            $($member::Value: Send + 'static,)+
        {
            type Output = ($($member::Value,)+);

            fn into_group_parts(
                self,
            ) -> Result<(Vec<GroupPart>, GroupMapper<Self::Output>), IoError> {
                let ($($item,)+) = self;
                $(let ($part, $mapper) = $item.into_group_part()?;)+
                let parts = vec![$($part),+];
                let mapper: GroupMapper<Self::Output> = Box::new(move |values| {
                    let mut values = values.into_iter();
                    Ok(($(
                        $mapper(values.next().ok_or_else(|| {
                            IoError::ProtocolMismatch("missing group value".to_string())
                        })?)?,
                    )+))
                });
                Ok((parts, mapper))
            }
        }
    };
}

impl_group_items!((M0, i0, p0, f0));
impl_group_items!((M0, i0, p0, f0), (M1, i1, p1, f1));
impl_group_items!((M0, i0, p0, f0), (M1, i1, p1, f1), (M2, i2, p2, f2));
impl_group_items!(
    (M0, i0, p0, f0),
    (M1, i1, p1, f1),
    (M2, i2, p2, f2),
    (M3, i3, p3, f3)
);
impl_group_items!(
    (M0, i0, p0, f0),
    (M1, i1, p1, f1),
    (M2, i2, p2, f2),
    (M3, i3, p3, f3),
    (M4, i4, p4, f4)
);
impl_group_items!(
    (M0, i0, p0, f0),
    (M1, i1, p1, f1),
    (M2, i2, p2, f2),
    (M3, i3, p3, f3),
    (M4, i4, p4, f4),
    (M5, i5, p5, f5)
);
impl_group_items!(
    (M0, i0, p0, f0),
    (M1, i1, p1, f1),
    (M2, i2, p2, f2),
    (M3, i3, p3, f3),
    (M4, i4, p4, f4),
    (M5, i5, p5, f5),
    (M6, i6, p6, f6)
);
impl_group_items!(
    (M0, i0, p0, f0),
    (M1, i1, p1, f1),
    (M2, i2, p2, f2),
    (M3, i3, p3, f3),
    (M4, i4, p4, f4),
    (M5, i5, p5, f5),
    (M6, i6, p6, f6),
    (M7, i7, p7, f7)
);

/// A batched render over an ordered tuple of promises.
pub struct IoGroupPromise<O> {
    pub(crate) client: Arc<IoClient>,
    pub(crate) members: Vec<RenderMember>,
    pub(crate) mapper: GroupMapper<O>,
    pub(crate) validator: Option<GroupValidator>,
}

impl<O: Send + 'static> IoGroupPromise<O> {
    /// Attach a validator over the whole batch, run after every member's
    /// own validator passed.
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&[Value]) -> Option<String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl<O: Send + 'static> IntoFuture for IoGroupPromise<O> {
    type Output = Result<O, IoError>;
    type IntoFuture = BoxFuture<'static, Result<O, IoError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let values = self
                .client
                .render_components(self.members, self.validator)
                .await?;
            (self.mapper)(values)
        })
    }
}
