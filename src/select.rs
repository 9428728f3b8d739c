//! Source selection and run preparation.
//!
//! Turns the validated command-line request into a [`RunConfig`]. Menu
//! rendering and yes/no prompts are injected through [`SourcePicker`] and
//! [`Confirm`], so tests script them instead of reading a terminal.
//! [`RunRequest::validate`] can be called up front to reject a bad market
//! or artist before credentials are even looked at.

use std::io::{BufRead, Write};

use crate::catalog::{Gateway, UserProfile};
use crate::error::{Error, Result};
use crate::market::Market;
use crate::model::{RunConfig, Source};

/// Chooses one source from a list of candidates.
pub trait SourcePicker {
    /// `None` when the user backs out.
    fn pick(&mut self, candidates: &[Source]) -> Result<Option<Source>>;
}

/// Asks a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// A terminal (or a script standing in for one) that can do both.
pub trait Interaction: SourcePicker + Confirm {}

impl<T: SourcePicker + Confirm> Interaction for T {}

/// How the source was requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    Library,
    Playlist(String),
    Menu,
}

/// Unvalidated run parameters.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub dry_run: bool,
    pub market: String,
    pub artist: Option<String>,
    pub source: SourceRequest,
    /// Skip the live-run confirmation
    pub assume_yes: bool,
}

impl RunRequest {
    /// Check market and artist filter without touching the network.
    pub fn validate(&self) -> Result<(Market, Option<String>)> {
        Ok((Market::parse(&self.market)?, artist_filter(self.artist.as_deref())?))
    }
}

/// Validate the artist filter: absent is fine, blank is not.
pub fn artist_filter(artist: Option<&str>) -> Result<Option<String>> {
    match artist {
        None => Ok(None),
        Some(name) if name.trim().is_empty() => Err(Error::config("--artist must not be empty")),
        Some(name) => Ok(Some(name.trim().to_string())),
    }
}

/// Playlists the user owns, behind the library entry.
pub async fn candidates(gateway: &Gateway, user: &UserProfile) -> Result<Vec<Source>> {
    let mut sources = vec![Source::library(&user.id)];
    sources.extend(
        gateway
            .owned_playlists(&user.id)
            .await?
            .into_iter()
            .map(|p| Source::playlist(p.id, p.owner_id, p.name)),
    );
    Ok(sources)
}

/// Fetch a playlist and check the user owns it.
pub async fn owned_playlist(gateway: &Gateway, user: &UserProfile, playlist_id: &str) -> Result<Source> {
    let playlist = match gateway.playlist(playlist_id).await {
        Ok(playlist) => playlist,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            tracing::debug!("Playlist lookup failed: {err}");
            return Err(Error::config(format!(
                "playlist '{playlist_id}' not found or not accessible"
            )));
        }
    };
    if playlist.owner_id != user.id {
        return Err(Error::config(format!(
            "'{}' is owned by '{}', not by you; only owned playlists can be audited",
            playlist.name, playlist.owner_id
        )));
    }
    Ok(Source::playlist(playlist.id, playlist.owner_id, playlist.name))
}

/// Validate the request, resolve its source and ask for any confirmation.
///
/// Market and artist filter are checked before the first network call.
/// Returns `None` when the user declines.
pub async fn prepare_run(
    gateway: &Gateway,
    request: &RunRequest,
    ui: &mut dyn Interaction,
) -> Result<Option<(UserProfile, RunConfig)>> {
    let (market, artist_filter) = request.validate()?;

    let user = gateway.current_user().await?;
    tracing::info!("Authenticated as {} ({})", user.display_name, user.id);

    let source = match &request.source {
        SourceRequest::Library => Source::library(&user.id),
        SourceRequest::Playlist(id) => owned_playlist(gateway, &user, id).await?,
        SourceRequest::Menu => {
            let sources = candidates(gateway, &user).await?;
            let Some(source) = ui.pick(&sources)? else {
                return Ok(None);
            };
            if !ui.confirm(&format!("Audit {source}?"))? {
                return Ok(None);
            }
            source
        }
    };

    if !request.dry_run
        && !request.assume_yes
        && !ui.confirm(&format!(
            "Live run: unplayable and relinked tracks in {source} will be replaced. Continue?"
        ))?
    {
        return Ok(None);
    }

    let run = RunConfig {
        dry_run: request.dry_run,
        market,
        artist_filter,
        source,
    };
    Ok(Some((user, run)))
}

/// Terminal implementation of [`SourcePicker`] and [`Confirm`].
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Next trimmed input line; `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> SourcePicker for Console<R, W> {
    fn pick(&mut self, candidates: &[Source]) -> Result<Option<Source>> {
        writeln!(self.output, "Select a source to audit:")?;
        for (i, source) in candidates.iter().enumerate() {
            writeln!(self.output, "  {:>2}) {source}", i + 1)?;
        }

        loop {
            write!(self.output, "Number (q to quit): ")?;
            self.output.flush()?;
            let Some(answer) = self.read_line()? else {
                return Ok(None);
            };
            if answer.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => {
                    return Ok(Some(candidates[n - 1].clone()));
                }
                _ => writeln!(self.output, "Please enter 1-{}", candidates.len())?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Confirm for Console<R, W> {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.output, "{question} [y/N] ")?;
        self.output.flush()?;
        let answer = self.read_line()?.unwrap_or_default().to_lowercase();
        Ok(matches!(answer.as_str(), "y" | "yes"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::catalog::ApiError;
    use crate::catalog::traits::mocks::MockCatalog;
    use crate::model::SourceKind;
    use crate::test_utils::fast_gateway;

    /// Picks a fixed index and answers every question the same way.
    struct Scripted {
        pick: Option<usize>,
        answer: bool,
        questions: Vec<String>,
    }

    impl Scripted {
        fn new(pick: Option<usize>, answer: bool) -> Self {
            Self {
                pick,
                answer,
                questions: Vec::new(),
            }
        }
    }

    impl SourcePicker for Scripted {
        fn pick(&mut self, candidates: &[Source]) -> Result<Option<Source>> {
            Ok(self.pick.and_then(|i| candidates.get(i).cloned()))
        }
    }

    impl Confirm for Scripted {
        fn confirm(&mut self, question: &str) -> Result<bool> {
            self.questions.push(question.to_string());
            Ok(self.answer)
        }
    }

    fn request(source: SourceRequest) -> RunRequest {
        RunRequest {
            dry_run: true,
            market: "be".into(),
            artist: None,
            source,
            assume_yes: false,
        }
    }

    /// Prepare with a picker and prompt that accept everything.
    async fn prepare(
        gateway: &Gateway,
        request: &RunRequest,
    ) -> Result<Option<(UserProfile, RunConfig)>> {
        prepare_run(gateway, request, &mut Scripted::new(None, true)).await
    }

    fn mock_with_playlists() -> Arc<MockCatalog> {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.add_playlist("mine", "Mine", "me", vec![])
            .add_playlist("theirs", "Theirs", "friend", vec![]);
        mock
    }

    #[tokio::test]
    async fn test_invalid_market_makes_no_network_calls() {
        let mock = mock_with_playlists();
        let gateway = fast_gateway(mock.clone());
        let mut request = request(SourceRequest::Library);
        request.market = "zz".into();

        let err = prepare(&gateway, &request)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_validate_without_gateway() {
        let mut req = request(SourceRequest::Library);
        req.artist = Some(" Band ".into());
        let (market, artist) = req.validate().unwrap();
        assert_eq!(market.as_str(), "BE");
        assert_eq!(artist.as_deref(), Some("Band"));

        req.market = "zz".into();
        assert!(matches!(req.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_market_case_is_irrelevant() {
        let gateway = fast_gateway(mock_with_playlists());
        let mut lower = request(SourceRequest::Library);
        lower.market = "be".into();
        let mut upper = lower.clone();
        upper.market = "BE".into();

        let (_, a) = prepare(&gateway, &lower)
            .await
            .unwrap()
            .unwrap();
        let (_, b) = prepare(&gateway, &upper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.market, b.market);
    }

    #[tokio::test]
    async fn test_blank_artist_is_config_error() {
        let mock = mock_with_playlists();
        let gateway = fast_gateway(mock.clone());
        let mut request = request(SourceRequest::Library);
        request.artist = Some("  ".into());

        let err = prepare(&gateway, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_playlist_ownership_is_checked() {
        let gateway = fast_gateway(mock_with_playlists());

        let err = prepare(&gateway, &request(SourceRequest::Playlist("theirs".into())))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not by you"));

        let err = prepare(&gateway, &request(SourceRequest::Playlist("nope".into())))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let (_, run) = prepare(&gateway, &request(SourceRequest::Playlist("mine".into())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.source.playlist_id(), Some("mine"));
    }

    #[tokio::test]
    async fn test_menu_lists_library_and_owned_playlists() {
        let gateway = fast_gateway(mock_with_playlists());
        let user = gateway.current_user().await.unwrap();

        let sources = candidates(&gateway, &user).await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].kind, SourceKind::Library);
        assert_eq!(sources[1].name, "Mine");
    }

    #[tokio::test]
    async fn test_menu_selection_is_confirmed() {
        let gateway = fast_gateway(mock_with_playlists());
        let mut ui = Scripted::new(Some(1), false);

        let declined = prepare_run(&gateway, &request(SourceRequest::Menu), &mut ui)
            .await
            .unwrap();
        assert!(declined.is_none());
        assert_eq!(ui.questions, vec!["Audit Playlist 'Mine'?"]);
    }

    #[tokio::test]
    async fn test_live_run_asks_unless_assumed() {
        let gateway = fast_gateway(mock_with_playlists());
        let mut live = request(SourceRequest::Library);
        live.dry_run = false;

        let mut no = Scripted::new(None, false);
        let declined = prepare_run(&gateway, &live, &mut no)
            .await
            .unwrap();
        assert!(declined.is_none());
        assert_eq!(no.questions.len(), 1);

        live.assume_yes = true;
        let mut never = Scripted::new(None, false);
        let accepted = prepare_run(&gateway, &live, &mut never)
            .await
            .unwrap();
        assert!(accepted.is_some());
        assert!(never.questions.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal_not_config() {
        let mock = mock_with_playlists();
        mock.fail_next("current_user", vec![ApiError::Unauthorized("bad token".into())]);
        let gateway = fast_gateway(mock);

        let err = prepare(&gateway, &request(SourceRequest::Library))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_console_picker_reprompts_until_valid() {
        let sources = vec![Source::library("me"), Source::playlist("p", "me", "Mix")];
        let mut output = Vec::new();
        let mut console = Console::new(Cursor::new("7\nabc\n2\n"), &mut output);

        let picked = console.pick(&sources).unwrap().unwrap();
        assert_eq!(picked.playlist_id(), Some("p"));
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains(" 1) Liked Songs"));
        assert_eq!(shown.matches("Please enter 1-2").count(), 2);
    }

    #[test]
    fn test_console_picker_quit_and_eof() {
        let sources = vec![Source::library("me")];
        let mut console = Console::new(Cursor::new("q\n"), Vec::new());
        assert!(console.pick(&sources).unwrap().is_none());
        let mut console = Console::new(Cursor::new(""), Vec::new());
        assert!(console.pick(&sources).unwrap().is_none());
    }

    #[test]
    fn test_console_confirm() {
        let mut console = Console::new(Cursor::new("Yes\nn\n"), Vec::new());
        assert!(console.confirm("Go?").unwrap());
        assert!(!console.confirm("Go?").unwrap());
        assert!(!console.confirm("Go?").unwrap());
    }
}
