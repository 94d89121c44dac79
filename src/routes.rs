// Route path constants - single source of truth for all API paths

pub const HEALTH: &str = "/health";
pub const DB_HEALTH: &str = "/db/health";
pub const DB_TEST: &str = "/db/test";
pub const METRICS: &str = "/metrics";
pub const PING: &str = "/test/ping";
pub const REDIS_TEST: &str = "/test/test-redis";
pub const ITEMS: &str = "/items";
pub const ITEM: &str = "/items/{id}";
pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";
pub const SWAGGER_UI: &str = "/swagger-ui";
