//! Host containers handed to guest code by reference

use std::any::Any;

use starbridge_vm::{Object, Value, VmError};

use super::{to_guest, HostValue};
use crate::error::ConvertError;

/// Kind of host container a wrapper stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    Slice,
    Map,
    Struct,
    Interface,
}

impl WrapperKind {
    pub fn name(&self) -> &'static str {
        match self {
            WrapperKind::Slice => "slice",
            WrapperKind::Map => "map",
            WrapperKind::Struct => "struct",
            WrapperKind::Interface => "interface",
        }
    }
}

/// An opaque host container; `None` content is a nil container
#[derive(Debug, Clone, PartialEq)]
pub struct HostWrapper {
    kind: WrapperKind,
    inner: Option<Box<HostValue>>,
}

impl HostWrapper {
    pub fn new(kind: WrapperKind, inner: HostValue) -> Self {
        Self {
            kind,
            inner: Some(Box::new(inner)),
        }
    }

    pub fn nil(kind: WrapperKind) -> Self {
        Self { kind, inner: None }
    }

    pub fn kind(&self) -> WrapperKind {
        self.kind
    }

    pub fn is_nil(&self) -> bool {
        self.inner.is_none()
    }

    /// The wrapped value, or a typed error for a nil wrapper
    pub fn unwrap(&self) -> Result<&HostValue, ConvertError> {
        self.inner
            .as_deref()
            .ok_or(ConvertError::NilWrapper(self.kind.name()))
    }

    fn guest_view(&self) -> Result<Value, VmError> {
        let inner = self
            .unwrap()
            .map_err(|e| VmError::runtime(e.to_string()))?;
        to_guest(inner).map_err(|e| VmError::runtime(e.to_string()))
    }
}

impl Object for HostWrapper {
    fn type_name(&self) -> &str {
        match self.kind {
            WrapperKind::Slice => "host_slice",
            WrapperKind::Map => "host_map",
            WrapperKind::Struct => "host_struct",
            WrapperKind::Interface => "host_interface",
        }
    }

    fn repr(&self) -> String {
        match &self.inner {
            Some(inner) => format!("{}({inner})", self.type_name()),
            None => format!("{}(nil)", self.type_name()),
        }
    }

    fn truth(&self) -> bool {
        self.inner.is_some()
    }

    fn len(&self) -> Option<usize> {
        match self.inner.as_deref() {
            Some(HostValue::List(items)) => Some(items.len()),
            Some(HostValue::Map(map)) => Some(map.len()),
            Some(HostValue::ValueMap(pairs)) => Some(pairs.len()),
            Some(_) => None,
            None => Some(0),
        }
    }

    fn get_index(&self, key: &Value) -> Result<Value, VmError> {
        starbridge_vm::vm::index(&self.guest_view()?, key)
    }

    fn iterate(&self) -> Option<Vec<Value>> {
        self.guest_view().ok()?.to_vec().ok()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::from_guest;

    #[test]
    fn test_nil_wrapper_reports_kind() {
        let value = Value::object(HostWrapper::nil(WrapperKind::Map));
        let err = from_guest(&value).unwrap_err();
        assert_eq!(err.to_string(), "nil map");
        assert!(!value.truth());
    }

    #[test]
    fn test_wrapper_unwraps_to_content() {
        let list = HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)]);
        let value = Value::object(HostWrapper::new(WrapperKind::Slice, list.clone()));
        assert_eq!(from_guest(&value).unwrap(), list);
        assert_eq!(value.len(), Some(2));
        assert_eq!(value.type_name(), "host_slice");
    }
}
