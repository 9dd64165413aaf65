/*
 * Responsibility
 * - middleware の公開インターフェース
 * - cors (PAT 管理 API 向け), http (request-id / trace / body limit / timeout)
 */
pub mod cors;
pub mod http;
