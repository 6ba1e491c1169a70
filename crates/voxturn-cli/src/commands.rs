//! Subcommands and their arguments.
//!
//! Every flag can also be set through the environment (and therefore a
//! `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use voxturn_axum::ServerConfig;
use voxturn_axum::bootstrap::DEFAULT_PORT;
use voxturn_core::SessionKey;
use voxturn_openai::OpenAiConfig;
use voxturn_openai::config::{
    DEFAULT_BASE_URL, DEFAULT_SPEECH_MODEL, DEFAULT_TRANSCRIPTION_MODEL, DEFAULT_VOICE,
};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the turn server
    Serve(ServeArgs),

    /// Send one turn to a running server and play the reply
    Talk(TalkArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "VOXTURN_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory of front-end assets to serve
    #[arg(long, env = "VOXTURN_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Allowed CORS origins, comma separated (default: any)
    #[arg(long, env = "VOXTURN_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Public URL prefix for audio links (default: http://localhost:PORT)
    #[arg(long, env = "VOXTURN_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// How long synthesized audio stays available, in seconds
    #[arg(long, env = "VOXTURN_AUDIO_TTL", default_value_t = 3600)]
    pub audio_ttl: u64,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Assistant that answers every turn
    #[arg(long, env = "OPENAI_ASSISTANT_ID")]
    pub assistant_id: String,

    /// OpenAI-compatible API root
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Speech-to-text model
    #[arg(long, env = "VOXTURN_TRANSCRIPTION_MODEL", default_value = DEFAULT_TRANSCRIPTION_MODEL)]
    pub transcription_model: String,

    /// Text-to-speech model
    #[arg(long, env = "VOXTURN_SPEECH_MODEL", default_value = DEFAULT_SPEECH_MODEL)]
    pub speech_model: String,

    /// Text-to-speech voice
    #[arg(long, env = "VOXTURN_VOICE", default_value = DEFAULT_VOICE)]
    pub voice: String,
}

impl ServeArgs {
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig {
            port: self.port,
            public_base_url: self.public_url.clone(),
            audio_ttl: Duration::from_secs(self.audio_ttl),
            ..ServerConfig::default()
        };
        if let Some(dir) = &self.static_dir {
            config = config.with_static_dir(dir);
        }
        let origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if !origins.is_empty() {
            config = config.with_allowed_origins(origins);
        }
        config
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            transcription_model: self.transcription_model.clone(),
            speech_model: self.speech_model.clone(),
            voice: self.voice.clone(),
            ..OpenAiConfig::new(&self.api_key, &self.assistant_id)
        }
        .with_base_url(&self.api_base_url)
    }
}

#[derive(Debug, Args)]
#[command(group(clap::ArgGroup::new("input").required(true).args(["recording", "text"])))]
pub struct TalkArgs {
    /// Recording to upload (WAV)
    pub recording: Option<PathBuf>,

    /// Send typed text instead of a recording
    #[arg(short, long)]
    pub text: Option<String>,

    /// Turn server base URL
    #[arg(short, long, env = "VOXTURN_SERVER", default_value = "http://localhost:3000")]
    pub server: String,

    /// Conversation to continue
    #[arg(long, env = "VOXTURN_SESSION", default_value = SessionKey::DEFAULT)]
    pub session: String,

    /// Hold playback until Enter is pressed
    #[arg(long)]
    pub manual_start: bool,

    /// Play the introduction before the turn
    #[arg(long)]
    pub intro: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::parser::Cli;

    fn serve(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["voxturn", "serve", "--api-key", "sk-test", "--assistant-id", "asst_1"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Serve(args) => args,
            Commands::Talk(_) => panic!("expected serve"),
        }
    }

    #[test]
    fn serve_flags_build_configs() {
        let args = serve(&[
            "--port",
            "8080",
            "--allowed-origins",
            "http://a.test, http://b.test",
            "--api-base-url",
            "http://localhost:9000/v1/",
            "--voice",
            "nova",
        ]);

        let server = args.server_config();
        assert_eq!(server.port, 8080);
        assert_eq!(server.base_url(), "http://localhost:8080");
        assert!(matches!(
            server.cors,
            voxturn_axum::CorsConfig::AllowOrigins(ref o) if o == &["http://a.test", "http://b.test"]
        ));

        let openai = args.openai_config();
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.assistant_id, "asst_1");
        assert_eq!(openai.base_url, "http://localhost:9000/v1");
        assert_eq!(openai.voice, "nova");
    }

    #[test]
    fn talk_needs_recording_or_text() {
        assert!(Cli::try_parse_from(["voxturn", "talk"]).is_err());

        let cli = Cli::parse_from(["voxturn", "talk", "question.wav", "--manual-start"]);
        let Commands::Talk(args) = cli.command else {
            panic!("expected talk");
        };
        assert_eq!(args.recording, Some(PathBuf::from("question.wav")));
        assert!(args.manual_start);
    }
}
