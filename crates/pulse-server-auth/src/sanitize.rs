// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant-binding sanitization for client-supplied payloads.
//!
//! The organization id is never accepted from client-controlled input.
//! Every create/update payload passes through [`sanitize_for_organization`]
//! before reaching persistence: any tenant field the client sent is stripped
//! and replaced with the trusted resolved value.

use crate::types::OrgId;
use serde_json::Value;

/// Client-facing spellings of the tenant field that must never be trusted.
const TENANT_FIELDS: &[&str] = &["org_id", "organization_id", "organizationId"];

/// Strip any client-supplied organization id from `payload` and substitute
/// the trusted resolved `org_id`.
///
/// For JSON objects the tenant field (under any accepted spelling) is
/// removed and `org_id` is set to the trusted value. Non-object payloads are
/// returned unchanged; they carry no fields to launder.
///
/// Holds for all inputs: `sanitize_for_organization(v, org)["org_id"] == org`
/// whenever `v` is an object, including inputs already carrying a different
/// organization id.
pub fn sanitize_for_organization(mut payload: Value, org_id: OrgId) -> Value {
	if let Value::Object(ref mut map) = payload {
		for field in TENANT_FIELDS {
			if map.remove(*field).is_some() {
				tracing::debug!(field, "stripped client-supplied organization id");
			}
		}
		map.insert("org_id".to_string(), Value::String(org_id.to_string()));
	}
	payload
}
