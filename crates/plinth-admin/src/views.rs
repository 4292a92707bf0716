//! Page handlers
//!
//! Each handler returns the context a template would receive, serialized as
//! JSON, or a redirect. Streaming export is the only non-JSON response.

use crate::auth::AdminUser;
use crate::delete::{CollectedInstance, DeleteCollector, repr_query};
use crate::error::{AdminError, AdminResult};
use crate::export::{ExportEngine, ExportError, export_filename, export_response, stream_serialize};
use crate::filters::{FilterEngine, FilterResult};
use crate::forms::{ALL_FIELDS_KEY, FormErrors, ModelForm, ValidationFailure};
use crate::http::{AdminBody, AdminRequest, json_response, redirect};
use crate::model_admin::ModelAdmin;
use crate::pagination::PaginatedQuery;
use crate::path::{PathError, resolve};
use crate::related::{ExportField, RelatedFieldCollector};
use crate::router::Route;
use crate::site::AdminSite;
use crate::text::{display_value, update_querystring, verbose_name};
use http::{Response, StatusCode};
use plinth_db::{
	DatabaseExt, EntityType, FieldValue, LOOKUP_SEP, Lookup, Predicate, ROOT_PATH, SelectQuery, SortOrder,
	record_pk,
};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// One list column with its header and sort link
#[derive(Debug, Clone, Serialize)]
struct Column {
	name: String,
	verbose_name: String,
	sortable: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	sort_url: Option<String>,
}

fn route_urls(site: &AdminSite, admin: &dyn ModelAdmin) -> JsonValue {
	let name = admin.admin_name();
	json!({
		"index": site.url(&Route::Index { admin: name.clone() }),
		"add": site.url(&Route::Add { admin: name.clone() }),
		"delete": site.url(&Route::Delete { admin: name.clone() }),
		"export": site.url(&Route::Export { admin: name.clone() }),
		"ajax": site.url(&Route::Ajax { admin: name }),
	})
}

fn edit_url(site: &AdminSite, admin: &dyn ModelAdmin, pk: &JsonValue) -> String {
	site.url(&Route::Edit {
		admin: admin.admin_name(),
		pk: display_value(pk),
	})
}

/// `?<current query with key=value>`, or `None` when `value` is 0
fn querystring_url(request: &AdminRequest, key: &str, value: u64) -> Option<String> {
	(value > 0).then(|| format!("?{}", update_querystring(request.raw_query(), key, &value.to_string())))
}

fn parse_pk(entity: &EntityType, raw: &str) -> AdminResult<FieldValue> {
	FieldValue::parse(&entity.pk().kind, raw)
		.ok_or_else(|| AdminError::BadRequest(format!("invalid primary key '{}'", raw)))
}

fn filter_engine<'a>(
	site: &'a AdminSite,
	allowed: Option<&'a [String]>,
	excluded: &'a [String],
) -> FilterEngine<'a> {
	FilterEngine::new(site.schema(), site.settings().max_relation_depth)
		.with_allowed(allowed)
		.with_excluded(excluded)
}

/// The admin's base query, ordered and filtered from the query string
fn filtered_query(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest) -> (FilterResult, JsonValue) {
	let ordering = request.query_value("ordering").unwrap_or("");
	let query = admin.apply_ordering(admin.base_query(), ordering);
	let allowed = admin.filter_fields();
	let excluded = admin.filter_exclude();
	let engine = filter_engine(site, allowed.as_deref(), &excluded);
	let result = engine.build_filter_tree(admin.entity(), request.query(), query);
	let field_tree = serde_json::to_value(engine.field_tree(admin.entity())).unwrap_or(JsonValue::Null);
	(result, field_tree)
}

pub async fn dashboard(site: &AdminSite, user: &AdminUser) -> AdminResult<Response<AdminBody>> {
	let models: Vec<JsonValue> = site
		.model_admins()
		.into_iter()
		.map(|admin| {
			json!({
				"name": admin.display_name(),
				"admin_name": admin.admin_name(),
				"urls": route_urls(site, admin.as_ref()),
			})
		})
		.collect();
	let mut panels = Vec::new();
	for panel in site.panels() {
		panels.push(json!({
			"title": panel.title(),
			"slug": panel.slug(),
			"context": panel.context(site.db()).await?,
		}));
	}
	Ok(json_response(
		StatusCode::OK,
		&json!({
			"site_name": site.settings().site_name,
			"user": user.username,
			"model_admins": models,
			"panels": panels,
		}),
	))
}

/// List page; a POST with selected ids hands them to the delete or export page
pub async fn index(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest) -> AdminResult<Response<AdminBody>> {
	let entity = admin.entity();
	if request.is_post() {
		let ids = request.form_values("id");
		let action = request
			.form_value("action")
			.ok_or_else(|| AdminError::BadRequest("missing bulk action".to_string()))?;
		let name = admin.admin_name();
		let (route, querystring) = if action == "delete" {
			let pairs: Vec<(&str, &str)> = ids.iter().map(|id| ("id", *id)).collect();
			(Route::Delete { admin: name }, serde_urlencoded::to_string(pairs))
		} else {
			let key = format!("{}{}in", entity.pk().name, LOOKUP_SEP);
			(
				Route::Export { admin: name },
				serde_urlencoded::to_string([(key, ids.join(","))]),
			)
		};
		let querystring = querystring.map_err(|e| AdminError::BadRequest(e.to_string()))?;
		return Ok(redirect(&format!("{}?{}", site.url(&route), querystring)));
	}

	let ordering = request.query_value("ordering").unwrap_or("").to_string();
	let (filtered, field_tree) = filtered_query(site, admin, request);
	let per_page = site
		.settings()
		.page_size(admin.paginate_by().unwrap_or(site.settings().paginate_by));
	let (page, records) = PaginatedQuery::new(filtered.query, per_page, request.query_value("page"))
		.fetch(site.db())
		.await?;

	let column_names = admin.columns();
	let columns: Vec<Column> = column_names
		.iter()
		.map(|name| {
			let sortable = admin.column_is_sortable(name);
			let next = if ordering == *name {
				format!("-{}", name)
			} else {
				name.clone()
			};
			Column {
				name: name.clone(),
				verbose_name: verbose_name(entity, name),
				sortable,
				sort_url: sortable
					.then(|| format!("?{}", update_querystring(request.raw_query(), "ordering", &next))),
			}
		})
		.collect();
	let rows: Vec<JsonValue> = records
		.iter()
		.map(|record| {
			let pk = record.get(&entity.pk().name).cloned().unwrap_or(JsonValue::Null);
			let values: Vec<String> = column_names
				.iter()
				.map(|name| record.get(name).map(display_value).unwrap_or_default())
				.collect();
			json!({
				"url": edit_url(site, admin, &pk),
				"pk": pk,
				"values": values,
			})
		})
		.collect();

	Ok(json_response(
		StatusCode::OK,
		&json!({
			"model": admin.display_name(),
			"admin_name": admin.admin_name(),
			"urls": route_urls(site, admin),
			"columns": columns,
			"rows": rows,
			"page": page,
			"prev_url": querystring_url(request, "page", page.prev_page),
			"next_url": querystring_url(request, "page", page.next_page),
			"ordering": ordering,
			"active_filters": filtered.applied,
			"filter_tree": filtered.tree,
			"filter_fields": field_tree,
		}),
	))
}

fn form_page(
	site: &AdminSite,
	admin: &dyn ModelAdmin,
	form: &ModelForm,
	pk: Option<&JsonValue>,
	errors: Option<&FormErrors>,
) -> Response<AdminBody> {
	json_response(
		StatusCode::OK,
		&json!({
			"model": admin.display_name(),
			"admin_name": admin.admin_name(),
			"urls": route_urls(site, admin),
			"adding": pk.is_none(),
			"pk": pk,
			"form": form.context(errors),
		}),
	)
}

/// Redirect chosen by the submit button: `save` lists, `save_add` adds another,
/// anything else continues editing the saved row
fn save_redirect(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest, pk: &JsonValue) -> Response<AdminBody> {
	let name = admin.admin_name();
	let location = if request.form_value("save").is_some() {
		site.url(&Route::Index { admin: name })
	} else if request.form_value("save_add").is_some() {
		site.url(&Route::Add { admin: name })
	} else {
		edit_url(site, admin, pk)
	};
	redirect(&location)
}

/// Validate and save a submitted form, or render it again with its errors
async fn process_form(
	site: &AdminSite,
	admin: &dyn ModelAdmin,
	request: &AdminRequest,
	form: ModelForm,
	existing: Option<&FieldValue>,
) -> AdminResult<Response<AdminBody>> {
	let bound = form.bind(request.form());
	let current = existing.map(FieldValue::to_json);
	let values = match bound.validate(site.db(), site.schema()).await {
		Ok(values) => values,
		Err(ValidationFailure::Invalid(errors)) => {
			return Ok(form_page(site, admin, bound.form(), current.as_ref(), Some(&errors)));
		}
		Err(ValidationFailure::Database(e)) => return Err(e.into()),
	};
	match admin.save_model(site.db(), values, existing).await {
		Ok(pk) => Ok(save_redirect(site, admin, request, &pk)),
		Err(AdminError::Database(e)) => {
			tracing::error!(admin = %admin.admin_name(), error = %e, "cannot save row");
			let mut errors = FormErrors::default();
			errors.add(ALL_FIELDS_KEY, format!("The {} could not be saved.", admin.display_name()));
			Ok(form_page(site, admin, bound.form(), current.as_ref(), Some(&errors)))
		}
		Err(e) => Err(e),
	}
}

pub async fn add(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest) -> AdminResult<Response<AdminBody>> {
	let form = ModelForm::for_entity(admin.entity(), &admin.form_options(true));
	if !request.is_post() {
		return Ok(form_page(site, admin, &form, None, None));
	}
	process_form(site, admin, request, form, None).await
}

pub async fn edit(
	site: &AdminSite,
	admin: &dyn ModelAdmin,
	request: &AdminRequest,
	raw_pk: &str,
) -> AdminResult<Response<AdminBody>> {
	let entity = admin.entity();
	let pk = parse_pk(entity, raw_pk)?;
	let query = admin.base_query().filter(Predicate::new(
		ROOT_PATH,
		entity.pk().name.clone(),
		Lookup::Eq,
		pk.clone(),
	));
	let record = site
		.db()
		.fetch_first(&query)
		.await?
		.ok_or_else(|| AdminError::NotFound(format!("{} {}", entity.name(), raw_pk)))?;
	let form = ModelForm::for_entity(entity, &admin.form_options(false));
	if !request.is_post() {
		let form = form.with_initial(&record);
		return Ok(form_page(site, admin, &form, Some(&pk.to_json()), None));
	}
	process_form(site, admin, request, form, Some(&pk)).await
}

/// Confirmation page listing what each selected row takes with it; POST deletes
pub async fn delete(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest) -> AdminResult<Response<AdminBody>> {
	let entity = admin.entity();
	let raw_ids = if request.is_post() {
		request.form_values("id")
	} else {
		request.query_values("id")
	};
	let pks = raw_ids
		.iter()
		.map(|raw| parse_pk(entity, raw))
		.collect::<AdminResult<Vec<_>>>()?;
	let records = if pks.is_empty() {
		Vec::new()
	} else {
		let query = repr_query(SelectQuery::new(Arc::clone(entity)))
			.filter(Predicate::new(
				ROOT_PATH,
				entity.pk().name.clone(),
				Lookup::In,
				FieldValue::List(pks),
			))
			.order_by(ROOT_PATH, entity.pk().name.clone(), SortOrder::Asc);
		site.db().fetch_records(&query).await?
	};
	let collector = DeleteCollector::new(site.db(), site.schema(), site.settings().max_delete_depth);

	if request.is_post() {
		let recursive = admin.delete_recursive();
		for record in &records {
			let pk = record_pk(entity, record)?;
			collector.delete_instance(entity, &pk, recursive).await?;
		}
		tracing::info!(admin = %admin.admin_name(), count = records.len(), recursive, "deleted selected rows");
		return Ok(redirect(&site.url(&Route::Index {
			admin: admin.admin_name(),
		})));
	}

	let collect = admin.delete_collect_objects();
	let mut objects = Vec::with_capacity(records.len());
	for record in &records {
		let instance = CollectedInstance::from_record(entity, record);
		let collected = if collect {
			collector.collect(entity, &record_pk(entity, record)?).await?
		} else {
			Vec::new()
		};
		objects.push(json!({
			"pk": instance.pk,
			"repr": instance.repr,
			"truncated": collected.iter().any(|g| g.truncated),
			"collected": collected,
		}));
	}
	Ok(json_response(
		StatusCode::OK,
		&json!({
			"model": admin.display_name(),
			"admin_name": admin.admin_name(),
			"urls": route_urls(site, admin),
			"collect_objects": collect,
			"objects": objects,
		}),
	))
}

/// Field picker on GET; POST streams the filtered rows with the picked fields
pub async fn export(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest) -> AdminResult<Response<AdminBody>> {
	let entity = admin.entity();
	let related = RelatedFieldCollector::new(site.schema(), site.settings().max_relation_depth).collect(entity);
	let (filtered, field_tree) = filtered_query(site, admin, request);

	if request.is_post() {
		let fields: Vec<String> = request
			.form_values("fields")
			.into_iter()
			.map(str::to_string)
			.collect();
		let query = ExportEngine::new(site.schema(), &related)
			.prepare_query(filtered.query, &fields)
			.inspect_err(|e| {
				if let ExportError::Path(e) = e {
					tracing::warn!(admin = %admin.admin_name(), error = %e, "rejected export field");
				}
			})?;
		let (columns, rows) = site.db().stream_rows(&query).await?;
		tracing::info!(admin = %admin.admin_name(), fields = fields.len(), "export started");
		return Ok(export_response(
			&export_filename(&admin.admin_name()),
			stream_serialize(columns, rows),
		));
	}

	let fields: Vec<ExportField> = entity
		.fields()
		.iter()
		.map(|field| ExportField {
			key: field.name.clone(),
			name: field.name.clone(),
			verbose_name: field.verbose_name.clone(),
		})
		.collect();
	Ok(json_response(
		StatusCode::OK,
		&json!({
			"model": admin.display_name(),
			"admin_name": admin.admin_name(),
			"urls": route_urls(site, admin),
			"fields": fields,
			"related_fields": related.to_groups(),
			"ordering": request.query_value("ordering").unwrap_or(""),
			"active_filters": filtered.applied,
			"filter_tree": filtered.tree,
			"filter_fields": field_tree,
		}),
	))
}

/// Related-object search backing the lookup widget
///
/// `field` names a relation path configured in `foreign_key_lookups`; rows of
/// its target whose lookup field contains `query` are returned one page at a time.
pub async fn ajax_list(site: &AdminSite, admin: &dyn ModelAdmin, request: &AdminRequest) -> AdminResult<Response<AdminBody>> {
	let field = request
		.query_value("field")
		.ok_or_else(|| AdminError::BadRequest("missing lookup field".to_string()))?;
	let lookups = admin.foreign_key_lookups();
	let lookup_field = lookups
		.get(field)
		.ok_or_else(|| AdminError::BadRequest(format!("'{}' has no lookup configured", field)))?;
	let hops = resolve(site.schema(), admin.entity(), field).inspect_err(|e| {
		tracing::warn!(admin = %admin.admin_name(), field, error = %e, "rejected lookup path");
	})?;
	let target = hops
		.last()
		.map(|hop| Arc::clone(&hop.entity))
		.ok_or(PathError::Empty)?;
	if target.field(lookup_field).is_none() {
		return Err(PathError::UnknownField {
			entity: target.name().to_string(),
			segment: lookup_field.clone(),
		}
		.into());
	}

	let mut query = repr_query(SelectQuery::new(Arc::clone(&target)))
		.order_by(ROOT_PATH, lookup_field.clone(), SortOrder::Asc);
	let search = request.query_value("query").unwrap_or("").trim();
	if !search.is_empty() {
		query = query.filter(Predicate::new(
			ROOT_PATH,
			lookup_field.clone(),
			Lookup::IContains,
			FieldValue::Text(search.to_string()),
		));
	}
	let per_page = site
		.settings()
		.page_size(admin.filter_paginate_by().unwrap_or(site.settings().filter_paginate_by));
	let (page, records) = PaginatedQuery::new(query, per_page, request.query_value("page"))
		.fetch(site.db())
		.await?;
	let object_list: Vec<JsonValue> = records
		.iter()
		.map(|record| {
			let instance = CollectedInstance::from_record(&target, record);
			json!({"id": instance.pk, "repr": instance.repr})
		})
		.collect();
	Ok(json_response(
		StatusCode::OK,
		&json!({
			"prev_page": page.prev_page,
			"next_page": page.next_page,
			"object_list": object_list,
		}),
	))
}
