//! Admission webhook for CloudCluster resources
//!
//! Validates and defaults CloudCluster specs on create and update. Only the
//! review handling lives here; TLS termination and request serving belong
//! to the manager deployment.

mod validation;

pub use validation::{default_spec, validate_create, validate_update, FieldError};

use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use tracing::warn;

use crate::crd::CloudCluster;

/// Handle one admission review for a CloudCluster.
pub fn review(review: AdmissionReview<CloudCluster>) -> AdmissionReview<DynamicObject> {
    let request: AdmissionRequest<CloudCluster> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            warn!("Invalid admission review: {err}");
            return AdmissionResponse::invalid(err.to_string()).into_review();
        }
    };

    admit(&request).into_review()
}

fn admit(request: &AdmissionRequest<CloudCluster>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let result = match request.operation {
        Operation::Create => request
            .object
            .as_ref()
            .map(validate_create)
            .unwrap_or(Ok(())),
        Operation::Update => match (&request.old_object, &request.object) {
            (Some(old), Some(new)) => validate_update(old, new),
            _ => Ok(()),
        },
        _ => Ok(()),
    };

    match result {
        Ok(()) => response,
        Err(errors) => {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            response.deny(message)
        }
    }
}
