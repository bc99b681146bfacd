//! Field validation and defaulting for CloudCluster specs

use std::net::Ipv4Addr;

use crate::crd::{CloudCluster, CloudClusterSpec, Ipv4PoolFallbackOrder, LoadBalancerScheme};

/// A single invalid field and what is wrong with it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Fill in the defaults downstream reconciliation relies on.
pub fn default_spec(spec: &mut CloudClusterSpec) {
    if spec.control_plane_load_balancer.scheme.is_none() {
        spec.control_plane_load_balancer.scheme = Some(LoadBalancerScheme::InternetFacing);
    }
    if let Some(pool) = &mut spec.network.vpc.elastic_ip_pool {
        if pool.public_ipv4_pool.is_some() && pool.public_ipv4_pool_fallback_order.is_none() {
            pool.public_ipv4_pool_fallback_order = Some(Ipv4PoolFallbackOrder::AmazonPool);
        }
    }
}

/// Validate a CloudCluster on create.
pub fn validate_create(cluster: &CloudCluster) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    validate_spec(&cluster.spec, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a CloudCluster on update, including immutable fields.
pub fn validate_update(old: &CloudCluster, new: &CloudCluster) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    validate_spec(&new.spec, &mut errors);

    if old.spec.region != new.spec.region {
        errors.push(FieldError::new("spec.region", "field is immutable"));
    }
    if !old.spec.network.vpc.id.is_empty() && old.spec.network.vpc.id != new.spec.network.vpc.id {
        errors.push(FieldError::new("spec.network.vpc.id", "field is immutable"));
    }
    if old.spec.control_plane_load_balancer.scheme.is_some()
        && old.spec.control_plane_load_balancer.scheme
            != new.spec.control_plane_load_balancer.scheme
    {
        errors.push(FieldError::new(
            "spec.controlPlaneLoadBalancer.scheme",
            "field is immutable",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_spec(spec: &CloudClusterSpec, errors: &mut Vec<FieldError>) {
    if spec.region.is_empty() {
        errors.push(FieldError::new("spec.region", "region must be set"));
    }

    if let Some(cidr) = &spec.network.vpc.cidr_block {
        if !is_valid_cidr(cidr) {
            errors.push(FieldError::new(
                "spec.network.vpc.cidrBlock",
                "must be a valid IPv4 CIDR block",
            ));
        }
    }

    for (i, cidr) in spec.bastion.allowed_cidr_blocks.iter().enumerate() {
        if !is_valid_cidr(cidr) {
            errors.push(FieldError::new(
                format!("spec.bastion.allowedCidrBlocks[{i}]"),
                "must be a valid IPv4 CIDR block",
            ));
        }
    }

    if let Some(pool) = &spec.network.vpc.elastic_ip_pool {
        if let Some(id) = &pool.public_ipv4_pool {
            if !id.starts_with("ipv4pool-ec2-") {
                errors.push(FieldError::new(
                    "spec.network.vpc.elasticIpPool.publicIpv4Pool",
                    "must be an ipv4pool-ec2- pool id",
                ));
            }
            if pool.public_ipv4_pool_fallback_order.is_none() {
                errors.push(FieldError::new(
                    "spec.network.vpc.elasticIpPool.publicIpv4PoolFallbackOrder",
                    "required when a public IPv4 pool is set",
                ));
            }
        }
    }

    for (key, value) in &spec.network.additional_tags {
        if key.is_empty() {
            errors.push(FieldError::new(
                "spec.network.additionalTags",
                "tag keys must not be empty",
            ));
        }
        if value.len() > 255 {
            errors.push(FieldError::new(
                format!("spec.network.additionalTags[{key}]"),
                "tag values must be at most 255 characters",
            ));
        }
    }
}

fn is_valid_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.split_once('/') else {
        return false;
    };
    if addr.parse::<Ipv4Addr>().is_err() {
        return false;
    }
    matches!(prefix.parse::<u8>(), Ok(p) if p <= 32)
}
