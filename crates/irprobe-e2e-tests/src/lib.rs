//! End-to-end tests for irprobe live under `tests/`.
