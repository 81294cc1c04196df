//! Site-agnostic listing source reading schema.org JSON-LD
//!
//! Many catalogs embed `ItemList`/`Product`/`BreadcrumbList` blocks in
//! `<script type="application/ld+json">` and advertise the following page
//! with `rel="next"`. This source addresses pages from the configured
//! `category_urls` or `search_url` template and extracts raw records from
//! those blocks only.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::config::SourceConfig;
use super::http_client::HttpClient;
use crate::crawling::{ListingPage, ListingSource, PageCursor, PagePayload, RequestProfile};
use crate::domain::RawListingRecord;
use crate::error::FetchError;

static LD_JSON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("ld+json selector is valid")
});

static NEXT_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"link[rel="next"], a[rel="next"]"#).expect("next link selector is valid")
});

pub struct JsonLdSource {
    name: String,
    config: SourceConfig,
    http: HttpClient,
}

impl JsonLdSource {
    pub fn new(name: impl Into<String>, config: SourceConfig, http: HttpClient) -> Self {
        Self {
            name: name.into(),
            config,
            http,
        }
    }

    /// URL of `cursor` for `category`
    pub fn page_url(&self, category: &str, cursor: &PageCursor) -> Result<String, FetchError> {
        page_url(&self.config, category, cursor)
    }
}

#[async_trait]
impl ListingSource for JsonLdSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(
        &self,
        category: &str,
        cursor: &PageCursor,
        profile: &RequestProfile,
    ) -> Result<PagePayload, FetchError> {
        let url = self.page_url(category, cursor)?;
        self.http.fetch(&url, profile).await
    }

    fn parse_page(
        &self,
        _category: &str,
        cursor: &PageCursor,
        payload: &PagePayload,
    ) -> Result<ListingPage, FetchError> {
        parse_listing_html(&payload.url, &payload.body, cursor)
    }
}

pub(crate) fn page_url(
    config: &SourceConfig,
    category: &str,
    cursor: &PageCursor,
) -> Result<String, FetchError> {
    if let Some(token) = &cursor.token {
        return Ok(token.clone());
    }

    if let Some(first) = config.category_url(category) {
        if cursor.page <= 1 {
            return Ok(first.clone());
        }
        let mut url = Url::parse(first).map_err(|e| FetchError::Unaddressable {
            message: format!("category URL '{first}': {e}"),
        })?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != config.page_param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(&config.page_param, &cursor.page.to_string());
        return Ok(url.into());
    }

    if let Some(template) = &config.search_url {
        let encoded: String = url::form_urlencoded::byte_serialize(category.as_bytes()).collect();
        return Ok(template
            .replace("{category}", &encoded)
            .replace("{page}", &cursor.page.to_string()));
    }

    Err(FetchError::Unaddressable {
        message: format!("no URL configured for category '{category}'"),
    })
}

/// Extract raw records and the next cursor from a listing page
pub fn parse_listing_html(
    page_url: &str,
    html: &str,
    cursor: &PageCursor,
) -> Result<ListingPage, FetchError> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let mut nodes = Vec::new();
    let mut blocks = 0usize;
    let mut broken = 0usize;
    for script in document.select(&LD_JSON_SELECTOR) {
        blocks += 1;
        let text: String = script.text().collect();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => flatten_nodes(value, &mut nodes),
            Err(_) => broken += 1,
        }
    }
    if blocks > 0 && broken == blocks {
        return Err(FetchError::Parse {
            url: page_url.to_string(),
            message: format!("{broken} ld+json block(s), none valid"),
        });
    }

    let breadcrumb = nodes
        .iter()
        .find(|n| has_type(n, "BreadcrumbList"))
        .and_then(breadcrumb_path);

    let mut records = Vec::new();
    for node in &nodes {
        if has_type(node, "ItemList") {
            for element in as_list(node.get("itemListElement")) {
                let product = element.get("item").filter(|i| i.is_object()).unwrap_or(element);
                if has_type(product, "Product") {
                    records.push(product_record(product, breadcrumb.as_deref()));
                } else if let Some(url) = element.get("url").or_else(|| element.get("item")).and_then(text) {
                    // ListItem without an embedded Product
                    let mut record = RawListingRecord::default().with_url(url);
                    record.name = element.get("name").and_then(text);
                    record.category_path = breadcrumb.clone();
                    if record.name.is_some() {
                        records.push(record);
                    }
                }
            }
        } else if has_type(node, "Product") {
            records.push(product_record(node, breadcrumb.as_deref()));
        }
    }

    let next = document
        .select(&NEXT_LINK_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| resolve(base.as_ref(), href))
        .filter(|href| href != page_url)
        .map(|href| PageCursor::with_token(cursor.page.saturating_add(1), href));

    Ok(ListingPage { records, next })
}

fn flatten_nodes(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_nodes(v, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_nodes(graph, out);
            }
            if map.contains_key("@type") {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => type_matches(t, wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| type_matches(t, wanted)),
        _ => false,
    }
}

fn type_matches(declared: &str, wanted: &str) -> bool {
    declared == wanted || declared.rsplit('/').next() == Some(wanted)
}

fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other @ Value::Object(_)) => vec![other],
        _ => Vec::new(),
    }
}

/// String or number as text; objects yield their `name`/`@id`/`url`
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["name", "url", "@id"]
            .iter()
            .find_map(|k| map.get(*k).and_then(text)),
        _ => None,
    }
}

fn field(node: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| node.get(*k).and_then(text))
}

fn product_record(product: &Value, breadcrumb: Option<&str>) -> RawListingRecord {
    let offers = as_list(product.get("offers"));
    let offer = offers.first().copied();

    let mut record = RawListingRecord {
        native_id: field(product, &["sku", "productID", "gtin13", "gtin", "mpn"]),
        name: field(product, &["name"]),
        brand_text: product.get("brand").and_then(text),
        product_url: field(product, &["url"]).or_else(|| offer.and_then(|o| field(o, &["url"]))),
        category_path: breadcrumb
            .map(str::to_string)
            .or_else(|| field(product, &["category"])),
        description: field(product, &["description"]),
        image_urls: image_list(product.get("image")),
        ..RawListingRecord::default()
    };

    if let Some(offer) = offer {
        record.price_text = field(offer, &["price", "lowPrice"]);
        record.currency_hint = field(offer, &["priceCurrency"]);
        record.stock_text = field(offer, &["availability"]).map(|a| stock_text(&a).to_string());
        for spec in as_list(offer.get("priceSpecification")) {
            let kind = field(spec, &["priceType"]).unwrap_or_default();
            if type_matches(&kind, "StrikethroughPrice") || type_matches(&kind, "ListPrice") {
                record.original_price_text = field(spec, &["price"]);
            } else if let Some(unit) = spec.get("referenceQuantity").and_then(|q| field(q, &["unitText", "unitCode"])) {
                if let Some(price) = field(spec, &["price"]) {
                    record.unit_price_text = Some(format!("{price} /{unit}"));
                }
            }
        }
    }

    if let Some(rating) = product.get("aggregateRating") {
        record.rating = field(rating, &["ratingValue"]);
        record.rating_count = field(rating, &["reviewCount", "ratingCount"]);
    }

    for property in as_list(product.get("additionalProperty")) {
        let name = field(property, &["name"]).unwrap_or_default().to_lowercase();
        let value = field(property, &["value"]);
        if name.contains("dimension") {
            record.dimension_text = value;
        } else if name.contains("longueur") || name.contains("hauteur") || name.contains("length") {
            record.length_text = value;
        } else if name.contains("largeur") || name.contains("width") {
            record.width_text = value;
        } else if name.contains("conditionnement") || name.contains("quantité") || name.contains("pack") {
            record.unit_count = value;
        }
    }
    record
}

fn image_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        Some(other) => text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// schema.org availability IRI to the stock wording the normalizer reads
fn stock_text(availability: &str) -> &'static str {
    let kind = availability.rsplit('/').next().unwrap_or(availability);
    match kind {
        "OutOfStock" | "SoldOut" | "Discontinued" => "out_of_stock",
        _ => "in_stock",
    }
}

fn breadcrumb_path(list: &Value) -> Option<String> {
    let mut items: Vec<(i64, String)> = as_list(list.get("itemListElement"))
        .into_iter()
        .filter_map(|item| {
            let position = item.get("position").and_then(Value::as_i64).unwrap_or(i64::MAX);
            let name = field(item, &["name"]).or_else(|| item.get("item").and_then(|i| field(i, &["name"])))?;
            Some((position, name))
        })
        .collect();
    items.sort_by_key(|(position, _)| *position);
    let path = items.into_iter().map(|(_, name)| name).collect::<Vec<_>>().join(" > ");
    (!path.is_empty()).then_some(path)
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok().map(Into::into),
        Err(_) => None,
    }
}
