// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ControllerError, Result};
use crate::resources::{names, owner_reference, stamp};
use crate::types::{Function, RequestProcessor};
use kube::api::ObjectMeta;
use kube::ResourceExt;

/// Function built for item `index` of `rp`, or `None` when the item has no
/// function build.
pub fn desired_function(rp: &RequestProcessor, index: usize) -> Result<Option<Function>> {
    let item = rp.spec.items.get(index).ok_or_else(|| {
        ControllerError::Construction(format!(
            "item {} is out of range for {} items",
            index,
            rp.spec.items.len()
        ))
    })?;
    let Some(spec) = item.function() else {
        return Ok(None);
    };

    let function = Function {
        metadata: ObjectMeta {
            name: Some(names::request_processor_item(rp, index)),
            namespace: rp.namespace(),
            labels: Some(names::owner_labels(rp)),
            owner_references: Some(vec![owner_reference(rp)?]),
            ..Default::default()
        },
        spec: spec.clone(),
        status: None,
    };
    stamp(function).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::recorded_hash;
    use crate::types::request_processor::{ItemBuild, RequestProcessorItem, RequestProcessorSpec};
    use crate::types::FunctionSpec;

    fn make_request_processor(items: Vec<RequestProcessorItem>) -> RequestProcessor {
        let mut rp = RequestProcessor::new("web", RequestProcessorSpec { items });
        rp.metadata.namespace = Some("default".to_string());
        rp.metadata.uid = Some("uid-rp".to_string());
        rp
    }

    fn function_item(image: &str) -> RequestProcessorItem {
        RequestProcessorItem {
            name: None,
            build: Some(ItemBuild {
                function: Some(FunctionSpec {
                    image: image.to_string(),
                    ..Default::default()
                }),
            }),
        }
    }

    #[test]
    fn test_item_with_function() {
        let rp = make_request_processor(vec![function_item("a"), function_item("b")]);
        let function = desired_function(&rp, 1).unwrap().unwrap();
        assert_eq!(function.metadata.name.as_deref(), Some("web-1"));
        assert_eq!(function.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(function.spec.image, "b");
        assert_eq!(
            function.metadata.owner_references.as_ref().unwrap()[0].uid,
            "uid-rp"
        );
        assert_eq!(
            function
                .labels()
                .get("knative.projectriff.io/requestprocessor")
                .map(String::as_str),
            Some("web")
        );
        assert!(recorded_hash(&function).is_some());
    }

    #[test]
    fn test_item_without_function() {
        let rp = make_request_processor(vec![RequestProcessorItem::default()]);
        assert!(desired_function(&rp, 0).unwrap().is_none());
    }

    #[test]
    fn test_index_out_of_range() {
        let rp = make_request_processor(vec![function_item("a")]);
        assert!(matches!(
            desired_function(&rp, 3),
            Err(ControllerError::Construction(_))
        ));
    }
}
