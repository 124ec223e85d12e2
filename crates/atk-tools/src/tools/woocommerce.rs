//! WooCommerce Tools
//!
//! Manage a WooCommerce store's products and orders through the REST API (`wc/v3`).
//!
//! ## Available Tools
//!
//! - `woocommerce_list_products` - List or search products
//! - `woocommerce_get_product` - Get a product by ID
//! - `woocommerce_create_product` - Create a product
//! - `woocommerce_update_stock` - Set a product's stock quantity
//! - `woocommerce_list_orders` - List orders
//! - `woocommerce_update_order_status` - Change an order's status
//!
//! Every operation returns a structured result: `success`, the result
//! fields, and `error`. On failure the result fields keep their defaults.

use atk_core::{
    AtkResult, Envelope, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome,
    ToolConfig, ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, join_url, lenient_string,
    null_default, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

const API_ROOT: &str = "wp-json/wc/v3";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WooCommerceConfig {
    /// Store root URL (e.g., https://shop.example.com)
    pub store_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

pub struct WooCommerce {
    config: WooCommerceConfig,
    transport: Arc<dyn HttpTransport>,
}

// ============================================================================
// Parameters
// ============================================================================

fn default_per_page() -> i64 {
    10
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListProductsParams {
    #[serde(default)]
    pub search: Option<String>,
    /// Category ID
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdParams {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductParams {
    pub name: String,
    #[serde(default = "default_product_type", rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub regular_price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
}

fn default_product_type() -> String {
    "simple".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStockParams {
    pub id: u64,
    pub stock_quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListOrdersParams {
    #[serde(default)]
    pub status: Option<String>,
    /// Customer ID
    #[serde(default)]
    pub customer: Option<u64>,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusParams {
    pub id: u64,
    pub status: String,
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: u64,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: u64,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_default")]
    pub product_type: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub sku: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price: String,
    #[serde(deserialize_with = "lenient_string")]
    pub regular_price: String,
    #[serde(deserialize_with = "lenient_string")]
    pub sale_price: String,
    #[serde(deserialize_with = "null_default")]
    pub manage_stock: bool,
    #[serde(deserialize_with = "null_default")]
    pub stock_quantity: i64,
    #[serde(deserialize_with = "null_default")]
    pub stock_status: String,
    #[serde(deserialize_with = "null_default")]
    pub categories: Vec<Category>,
    #[serde(deserialize_with = "null_default")]
    pub permalink: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub count: usize,
    pub page: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockUpdate {
    pub id: u64,
    pub name: String,
    pub stock_quantity: i64,
    pub stock_status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Billing {
    #[serde(deserialize_with = "null_default")]
    first_name: String,
    #[serde(deserialize_with = "null_default")]
    last_name: String,
    #[serde(deserialize_with = "null_default")]
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireOrder {
    id: u64,
    #[serde(deserialize_with = "lenient_string")]
    number: String,
    #[serde(deserialize_with = "null_default")]
    status: String,
    #[serde(deserialize_with = "lenient_string")]
    total: String,
    #[serde(deserialize_with = "null_default")]
    currency: String,
    customer_id: u64,
    #[serde(deserialize_with = "null_default")]
    billing: Billing,
    #[serde(deserialize_with = "null_default")]
    line_items: Vec<Value>,
    #[serde(deserialize_with = "null_default")]
    date_created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Order {
    pub id: u64,
    pub number: String,
    pub status: String,
    pub total: String,
    pub currency: String,
    pub customer_id: u64,
    pub customer_name: String,
    pub customer_email: String,
    pub item_count: usize,
    pub date_created: String,
}

impl From<WireOrder> for Order {
    fn from(order: WireOrder) -> Self {
        let customer_name = format!("{} {}", order.billing.first_name, order.billing.last_name)
            .trim()
            .to_string();
        Self {
            id: order.id,
            number: order.number,
            status: order.status,
            total: order.total,
            currency: order.currency,
            customer_id: order.customer_id,
            customer_name,
            customer_email: order.billing.email,
            item_count: order.line_items.len(),
            date_created: order.date_created,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub count: usize,
    pub page: i64,
}

/// WordPress REST errors: `{"code": "...", "message": "...", "data": {"status": 404}}`
fn upstream_error(body: &Value) -> Option<String> {
    let code = body.get("code").and_then(Value::as_str)?;
    Some(
        body.get("message")
            .and_then(describe)
            .unwrap_or_else(|| code.to_string()),
    )
}

impl WooCommerce {
    pub fn new(config: WooCommerceConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let root = join_url(&self.config.store_url, API_ROOT);
        HttpRequest::new(method, join_url(&root, path)).basic_auth(
            self.config.consumer_key.clone(),
            Some(self.config.consumer_secret.clone()),
        )
    }

    async fn call<T: DeserializeOwned + Default>(
        &self,
        action: &str,
        request: HttpRequest,
    ) -> Outcome<T> {
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure(action, &e))?;
        decode(body).map_err(|e| failure(action, &e))
    }

    pub async fn list_products(&self, params: ListProductsParams) -> Envelope<ProductList> {
        let per_page = clamp(params.per_page, 1, 100);
        let page = params.page.max(1);

        debug!(search = ?params.search, per_page = per_page, page = page, "Listing products");

        let request = self
            .request(HttpMethod::Get, "products")
            .query("per_page", per_page)
            .query("page", page)
            .query_opt("search", params.search.filter(|s| !s.is_empty()))
            .query_opt("category", params.category.filter(|c| !c.is_empty()))
            .query_opt("status", params.status.filter(|s| !s.is_empty()));

        self.call::<Vec<Product>>("listing products", request)
            .await
            .map(|products| ProductList {
                count: products.len(),
                products,
                page,
            })
            .into()
    }

    pub async fn get_product(&self, params: IdParams) -> Envelope<Product> {
        let request = self.request(HttpMethod::Get, &format!("products/{}", params.id));
        self.call::<Product>("getting product", request).await.into()
    }

    pub async fn create_product(&self, params: CreateProductParams) -> Envelope<Product> {
        if params.name.trim().is_empty() {
            return Envelope::failed(failure("creating product", "name must not be empty"));
        }

        let mut body = json!({ "name": params.name, "type": params.product_type });
        if let Some(price) = params.regular_price.filter(|p| !p.is_empty()) {
            body["regular_price"] = json!(price);
        }
        if let Some(description) = params.description.filter(|d| !d.is_empty()) {
            body["description"] = json!(description);
        }
        if let Some(sku) = params.sku.filter(|s| !s.is_empty()) {
            body["sku"] = json!(sku);
        }
        if let Some(quantity) = params.stock_quantity {
            body["manage_stock"] = json!(true);
            body["stock_quantity"] = json!(quantity);
        }

        debug!(name = %params.name, "Creating product");

        let request = self.request(HttpMethod::Post, "products").json(body);
        self.call::<Product>("creating product", request).await.into()
    }

    pub async fn update_stock(&self, params: UpdateStockParams) -> Envelope<StockUpdate> {
        debug!(id = params.id, quantity = params.stock_quantity, "Updating stock");

        let request = self
            .request(HttpMethod::Put, &format!("products/{}", params.id))
            .json(json!({
                "manage_stock": true,
                "stock_quantity": params.stock_quantity,
            }));

        self.call::<Product>("updating stock", request)
            .await
            .map(|product| StockUpdate {
                id: product.id,
                name: product.name,
                stock_quantity: product.stock_quantity,
                stock_status: product.stock_status,
            })
            .into()
    }

    pub async fn list_orders(&self, params: ListOrdersParams) -> Envelope<OrderList> {
        let per_page = clamp(params.per_page, 1, 100);
        let page = params.page.max(1);

        let request = self
            .request(HttpMethod::Get, "orders")
            .query("per_page", per_page)
            .query("page", page)
            .query_opt("status", params.status.filter(|s| !s.is_empty()))
            .query_opt("customer", params.customer);

        self.call::<Vec<WireOrder>>("listing orders", request)
            .await
            .map(|orders| {
                let orders: Vec<Order> = orders.into_iter().map(Order::from).collect();
                OrderList {
                    count: orders.len(),
                    orders,
                    page,
                }
            })
            .into()
    }

    pub async fn update_order_status(&self, params: UpdateOrderStatusParams) -> Envelope<Order> {
        debug!(id = params.id, status = %params.status, "Updating order status");

        let request = self
            .request(HttpMethod::Put, &format!("orders/{}", params.id))
            .json(json!({ "status": params.status }));

        self.call::<WireOrder>("updating order status", request)
            .await
            .map(Order::from)
            .into()
    }
}

fn http_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Http,
        FailureContract::Structured,
    )
}

#[async_trait]
impl Adapter for WooCommerce {
    fn category(&self) -> ToolCategory {
        ToolCategory::Commerce
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let per_page = json!({
            "type": "integer",
            "description": "Results per page (1-100)",
            "default": 10,
            "minimum": 1,
            "maximum": 100
        });
        let page = json!({ "type": "integer", "description": "Page number", "default": 1 });

        vec![
            http_tool(
                "woocommerce_list_products",
                "List store products, optionally filtered by search term, category or status.",
                create_schema(
                    json!({
                        "search": { "type": "string", "description": "Search term" },
                        "category": { "type": "string", "description": "Category ID" },
                        "status": {
                            "type": "string",
                            "description": "Product status",
                            "enum": ["draft", "pending", "private", "publish", "any"]
                        },
                        "per_page": per_page.clone(),
                        "page": page.clone()
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "woocommerce_get_product",
                "Get a product by ID.",
                create_schema(
                    json!({ "id": { "type": "integer", "description": "Product ID" } }),
                    vec!["id"],
                ),
            ),
            http_tool(
                "woocommerce_create_product",
                "Create a product. Passing stock_quantity enables stock management.",
                create_schema(
                    json!({
                        "name": { "type": "string", "description": "Product name" },
                        "type": {
                            "type": "string",
                            "description": "Product type",
                            "enum": ["simple", "grouped", "external", "variable"],
                            "default": "simple"
                        },
                        "regular_price": { "type": "string", "description": "Regular price (e.g., '19.99')" },
                        "description": { "type": "string", "description": "Product description (HTML allowed)" },
                        "sku": { "type": "string", "description": "Stock keeping unit" },
                        "stock_quantity": { "type": "integer", "description": "Initial stock quantity" }
                    }),
                    vec!["name"],
                ),
            ),
            http_tool(
                "woocommerce_update_stock",
                "Set the stock quantity of a product.",
                create_schema(
                    json!({
                        "id": { "type": "integer", "description": "Product ID" },
                        "stock_quantity": { "type": "integer", "description": "New stock quantity" }
                    }),
                    vec!["id", "stock_quantity"],
                ),
            ),
            http_tool(
                "woocommerce_list_orders",
                "List orders, optionally filtered by status or customer.",
                create_schema(
                    json!({
                        "status": {
                            "type": "string",
                            "description": "Order status",
                            "enum": ["pending", "processing", "on-hold", "completed", "cancelled", "refunded", "failed", "any"]
                        },
                        "customer": { "type": "integer", "description": "Customer ID" },
                        "per_page": per_page,
                        "page": page
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "woocommerce_update_order_status",
                "Change the status of an order.",
                create_schema(
                    json!({
                        "id": { "type": "integer", "description": "Order ID" },
                        "status": {
                            "type": "string",
                            "description": "New status",
                            "enum": ["pending", "processing", "on-hold", "completed", "cancelled", "refunded", "failed"]
                        }
                    }),
                    vec!["id", "status"],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "woocommerce_list_products" => {
                ToolResult::from_envelope(self.list_products(input.parse()?).await)
            }
            "woocommerce_get_product" => {
                ToolResult::from_envelope(self.get_product(input.parse()?).await)
            }
            "woocommerce_create_product" => {
                ToolResult::from_envelope(self.create_product(input.parse()?).await)
            }
            "woocommerce_update_stock" => {
                ToolResult::from_envelope(self.update_stock(input.parse()?).await)
            }
            "woocommerce_list_orders" => {
                ToolResult::from_envelope(self.list_orders(input.parse()?).await)
            }
            "woocommerce_update_order_status" => {
                ToolResult::from_envelope(self.update_order_status(input.parse()?).await)
            }
            other => return Err(unknown_operation(other)),
        })
    }
}
