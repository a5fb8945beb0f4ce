// Integration tests for loading and triaging through the public API.
mod load_alerts;
mod support;
mod triage;
