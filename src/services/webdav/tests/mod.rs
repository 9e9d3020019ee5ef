// Tests for the path orchestration layer, run against the in-memory transport
