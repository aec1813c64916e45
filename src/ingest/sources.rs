// src/ingest/sources.rs
//! Monitored endpoints.

use crate::ingest::types::{Service, Source, SourceKind};

pub const SOURCES: &[Source] = &[
    // OpenAI
    Source {
        id: "openai_chatgpt_release_notes",
        service: Service::OpenAi,
        label: "OpenAI ChatGPT Release Notes",
        kind: SourceKind::Html,
        url: "https://help.openai.com/en/articles/6825453-chatgpt-release-notes",
    },
    Source {
        id: "openai_codex_changelog",
        service: Service::OpenAi,
        label: "OpenAI Codex Changelog",
        kind: SourceKind::Html,
        url: "https://developers.openai.com/codex/changelog",
    },
    // Gemini
    Source {
        id: "gemini_api_changelog",
        service: Service::Gemini,
        label: "Gemini API Changelog",
        kind: SourceKind::Html,
        url: "https://ai.google.dev/gemini-api/docs/changelog",
    },
    // Claude
    Source {
        id: "claude_code_release_notes",
        service: Service::Claude,
        label: "Claude Code Release Notes",
        kind: SourceKind::Html,
        url: "https://docs.anthropic.com/en/release-notes/claude-code",
    },
];
