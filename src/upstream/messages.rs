use serde::{Deserialize, Serialize};

/// First message on a Live API connection
#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    /// Presence enables transcription of the input audio
    pub input_audio_transcription: InputAudioTranscription,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct InputAudioTranscription {}

impl SetupMessage {
    /// Text responses with input transcription enabled
    pub fn text_with_transcription(model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Self {
            setup: Setup {
                model,
                generation_config: GenerationConfig {
                    response_modalities: vec!["TEXT".to_string()],
                },
                input_audio_transcription: InputAudioTranscription::default(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInputPayload,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub data: String,
    pub mime_type: String,
}

/// Anything the Live API sends after setup
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub go_away: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub input_transcription: Option<Transcription>,
    pub model_turn: Option<Content>,
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

impl ServerMessage {
    /// Non-empty transcription of the input audio
    pub fn input_transcription(&self) -> Option<String> {
        self.server_content
            .as_ref()?
            .input_transcription
            .as_ref()?
            .text
            .clone()
            .filter(|t| !t.is_empty())
    }

    /// Concatenated text parts of the model turn
    pub fn text(&self) -> Option<String> {
        let parts = &self.server_content.as_ref()?.model_turn.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}
