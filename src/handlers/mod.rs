// handlers/mod.rs - two security tiers
//
// Public (no JWT): /health, /api/v1/auth/login
// Protected (JWT + tenant): /api/v1/core/**
pub mod extract;
pub mod protected;
pub mod public;
