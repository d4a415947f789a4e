//! Score file parsing: CSV (one game per row or `game1..game3` columns) and
//! the lane-scoring XML export.

use super::{
    errors::{ImportError, ImportResult},
    models::{RowError, ScoreRow},
    normalize::header_key,
    registration::parse_number,
};
use crate::standings::ScoreEvent;
use csv::StringRecord;
use quick_xml::{Reader, events::Event as XmlEvent};

const GAMES_PER_EVENT: i16 = 3;

struct ScoreLayout {
    pid: Option<usize>,
    first_name: Option<usize>,
    last_name: Option<usize>,
    event: usize,
    game: Option<usize>,
    score: Option<usize>,
    /// `game1..game3` columns of the wide layout
    games: [Option<usize>; 3],
}

impl ScoreLayout {
    fn new(headers: &StringRecord) -> ImportResult<Self> {
        let mut pid = None;
        let mut first_name = None;
        let mut last_name = None;
        let mut event = None;
        let mut game = None;
        let mut score = None;
        let mut games = [None; 3];

        for (index, header) in headers.iter().enumerate() {
            let slot = match header_key(header).as_str() {
                "pid" | "participantid" | "bowlerid" => &mut pid,
                "firstname" | "first" | "fname" => &mut first_name,
                "lastname" | "last" | "lname" | "surname" => &mut last_name,
                "event" => &mut event,
                "game" | "gamenumber" => &mut game,
                "score" | "pins" => &mut score,
                "game1" | "g1" => &mut games[0],
                "game2" | "g2" => &mut games[1],
                "game3" | "g3" => &mut games[2],
                _ => continue,
            };
            slot.get_or_insert(index);
        }

        if pid.is_none() && (first_name.is_none() || last_name.is_none()) {
            return Err(ImportError::MissingColumn("pid or first/last name"));
        }
        let event = event.ok_or(ImportError::MissingColumn("event"))?;
        let long = game.is_some() && score.is_some();
        if !long && games.iter().all(Option::is_none) {
            return Err(ImportError::MissingColumn("game/score or game1..game3"));
        }

        Ok(Self {
            pid,
            first_name,
            last_name,
            event,
            game: if long { game } else { None },
            score: if long { score } else { None },
            games,
        })
    }
}

fn cell(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Parse a score CSV
pub fn parse_score_csv(data: &[u8]) -> ImportResult<(Vec<ScoreRow>, Vec<RowError>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let layout = ScoreLayout::new(reader.headers()?)?;

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                errors.push(RowError::new(line, e.to_string()));
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        match parse_csv_record(&layout, &record, line) {
            Ok(parsed) => rows.extend(parsed),
            Err(message) => errors.push(RowError::new(line, message)),
        }
    }

    Ok((rows, errors))
}

fn parse_csv_record(
    layout: &ScoreLayout,
    record: &StringRecord,
    line: u64,
) -> Result<Vec<ScoreRow>, String> {
    let pid = parse_number::<i64>(cell(record, layout.pid), "PID")?;
    let first_name = cell(record, layout.first_name).map(str::to_string);
    let last_name = cell(record, layout.last_name).map(str::to_string);
    if pid.is_none() && (first_name.is_none() || last_name.is_none()) {
        return Err("Row has neither a PID nor a full name".to_string());
    }
    let event = parse_event(cell(record, Some(layout.event)).unwrap_or_default())?;

    let row = |game: i16, score: i16| ScoreRow {
        line,
        pid,
        first_name: first_name.clone(),
        last_name: last_name.clone(),
        event,
        game,
        score,
    };

    if layout.game.is_some() {
        let game = parse_game(cell(record, layout.game).unwrap_or_default())?;
        let score = parse_score(cell(record, layout.score).unwrap_or_default())?;
        return Ok(vec![row(game, score)]);
    }

    let mut parsed = Vec::new();
    for (game, index) in (1..=GAMES_PER_EVENT).zip(layout.games) {
        if let Some(value) = cell(record, index) {
            parsed.push(row(game, parse_score(value)?));
        }
    }
    if parsed.is_empty() {
        return Err("Row has no scores".to_string());
    }
    Ok(parsed)
}

/// Parse the lane-scoring XML export
///
/// ```xml
/// <scores tournament="spring-classic-2025">
///   <bowler pid="17" first="Ann" last="Lee">
///     <game event="singles" number="1">201</game>
///   </bowler>
/// </scores>
/// ```
///
/// The root's `tournament` attribute must equal `tournament_identifier`.
/// Malformed XML rejects the whole file; a bad `<game>` element is skipped
/// and reported with its line number.
pub fn parse_score_xml(
    data: &[u8],
    tournament_identifier: &str,
) -> ImportResult<(Vec<ScoreRow>, Vec<RowError>)> {
    let text = std::str::from_utf8(data).map_err(|_| ImportError::InvalidEncoding)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut seen_root = false;
    let mut bowler: Option<XmlBowler> = None;
    let mut game: Option<XmlGame> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let line = line_at(text, reader.buffer_position() as usize);
                return Err(ImportError::Xml(format!("{e} (line {line})")));
            }
        };
        // End of the element just read, on the same line as its tag
        let position = reader.buffer_position() as usize;

        match event {
            XmlEvent::Start(ref e) | XmlEvent::Empty(ref e) => {
                let self_closing = matches!(event, XmlEvent::Empty(_));
                let line = line_at(text, position);
                let attrs = attributes(e, line)?;
                match e.name().as_ref() {
                    b"scores" => {
                        let found = attr(&attrs, "tournament").unwrap_or_default();
                        if found != tournament_identifier {
                            return Err(ImportError::TournamentMismatch {
                                expected: tournament_identifier.to_string(),
                                found: found.to_string(),
                            });
                        }
                        seen_root = true;
                    }
                    b"bowler" if !self_closing => {
                        bowler = Some(XmlBowler::from_attrs(&attrs, line));
                    }
                    b"game" if self_closing => {
                        errors.push(RowError::new(line, "Game has no score"));
                    }
                    b"game" => game = Some(XmlGame::from_attrs(&attrs, line)),
                    _ => {}
                }
            }
            XmlEvent::Text(t) => {
                if let Some(game) = game.as_mut() {
                    let value = t
                        .unescape()
                        .map_err(|e| ImportError::Xml(format!("{e} (line {})", game.line)))?;
                    game.text.push_str(value.trim());
                }
            }
            XmlEvent::End(e) => match e.name().as_ref() {
                b"game" => {
                    if let Some(finished) = game.take() {
                        match finish_game(bowler.as_ref(), finished) {
                            Ok(row) => rows.push(row),
                            Err(err) => errors.push(err),
                        }
                    }
                }
                b"bowler" => bowler = None,
                _ => {}
            },
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(ImportError::Xml("Missing <scores> root element".to_string()));
    }

    Ok((rows, errors))
}

#[derive(Debug, Default)]
struct XmlBowler {
    pid: Option<String>,
    first: Option<String>,
    last: Option<String>,
    line: u64,
}

impl XmlBowler {
    fn from_attrs(attrs: &[(String, String)], line: u64) -> Self {
        Self {
            pid: attr(attrs, "pid").map(str::to_string),
            first: attr(attrs, "first").map(str::to_string),
            last: attr(attrs, "last").map(str::to_string),
            line,
        }
    }
}

#[derive(Debug, Default)]
struct XmlGame {
    event: Option<String>,
    number: Option<String>,
    text: String,
    line: u64,
}

impl XmlGame {
    fn from_attrs(attrs: &[(String, String)], line: u64) -> Self {
        Self {
            event: attr(attrs, "event").map(str::to_string),
            number: attr(attrs, "number").map(str::to_string),
            text: String::new(),
            line,
        }
    }
}

fn finish_game(bowler: Option<&XmlBowler>, game: XmlGame) -> Result<ScoreRow, RowError> {
    let line = game.line;
    let fail = |message: String| RowError::new(line, message);

    let bowler = bowler.ok_or_else(|| fail("Game outside of a <bowler> element".to_string()))?;
    let pid = parse_number::<i64>(bowler.pid.as_deref(), "PID").map_err(fail)?;
    if pid.is_none() && (bowler.first.is_none() || bowler.last.is_none()) {
        return Err(RowError::new(
            bowler.line,
            "Bowler has neither a pid nor first and last names",
        ));
    }

    Ok(ScoreRow {
        line,
        pid,
        first_name: bowler.first.clone(),
        last_name: bowler.last.clone(),
        event: parse_event(game.event.as_deref().unwrap_or_default()).map_err(fail)?,
        game: parse_game(game.number.as_deref().unwrap_or_default()).map_err(fail)?,
        score: parse_score(&game.text).map_err(fail)?,
    })
}

fn attributes(
    element: &quick_xml::events::BytesStart<'_>,
    line: u64,
) -> ImportResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attribute in element.attributes() {
        let attribute =
            attribute.map_err(|e| ImportError::Xml(format!("{e} (line {line})")))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| ImportError::Xml(format!("{e} (line {line})")))?;
        attrs.push((key, value.trim().to_string()));
    }
    Ok(attrs)
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}

/// 1-based line of a byte offset
fn line_at(text: &str, offset: usize) -> u64 {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u64 + 1
}

fn parse_event(value: &str) -> Result<ScoreEvent, String> {
    value
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| format!("Unknown event: {value:?}"))
}

fn parse_game(value: &str) -> Result<i16, String> {
    match value.trim().parse::<i16>() {
        Ok(game) if (1..=GAMES_PER_EVENT).contains(&game) => Ok(game),
        _ => Err(format!("Game number must be 1-{GAMES_PER_EVENT}, got {value:?}")),
    }
}

fn parse_score(value: &str) -> Result<i16, String> {
    match value.trim().parse::<i16>() {
        Ok(score) if (0..=300).contains(&score) => Ok(score),
        _ => Err(format!("Score must be 0-300, got {value:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_csv() {
        let csv = "\
PID,Event,Game,Score
17,Singles,1,201
17,singles,2,188
,doubles,1,150
18,bowling,1,150
18,team,4,150
18,team,1,301
";
        let (rows, errors) = parse_score_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event, ScoreEvent::Singles);
        assert_eq!((rows[1].game, rows[1].score), (2, 188));
        let lines: Vec<_> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_wide_csv_by_name() {
        let csv = "\
first_name,last_name,event,game1,game2,game3
Ann,Lee,team,180,,210
Bob,Ray,team,,,
";
        let (rows, errors) = parse_score_csv(csv.as_bytes()).unwrap();
        let games: Vec<_> = rows.iter().map(|r| (r.game, r.score)).collect();
        assert_eq!(games, vec![(1, 180), (3, 210)]);
        assert!(rows.iter().all(|r| r.pid.is_none() && r.last_name.as_deref() == Some("Lee")));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 3);
    }

    #[test]
    fn test_csv_without_identity_rejected() {
        let csv = "event,game,score\nsingles,1,200\n";
        assert!(matches!(
            parse_score_csv(csv.as_bytes()),
            Err(ImportError::MissingColumn(_))
        ));
    }

    const XML: &str = r#"<?xml version="1.0"?>
<scores tournament="spring-classic">
  <bowler pid="17" first="Ann" last="Lee">
    <game event="singles" number="1">201</game>
    <game event="singles" number="2"> 188 </game>
    <game event="doubles" number="9">150</game>
  </bowler>
  <bowler first="Jos&#233;" last="N&#250;&#241;ez">
    <game event="team" number="3">300</game>
    <game event="team" number="2"/>
  </bowler>
</scores>
"#;

    #[test]
    fn test_xml_scores() {
        let (rows, errors) = parse_score_xml(XML.as_bytes(), "spring-classic").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].pid, Some(17));
        assert_eq!((rows[1].game, rows[1].score), (2, 188));
        assert_eq!(rows[2].first_name.as_deref(), Some("José"));
        assert_eq!(rows[2].last_name.as_deref(), Some("Núñez"));
        assert_eq!(rows[2].event, ScoreEvent::Team);

        let lines: Vec<_> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![6, 10]);
    }

    #[test]
    fn test_xml_wrong_tournament() {
        assert!(matches!(
            parse_score_xml(XML.as_bytes(), "fall-open"),
            Err(ImportError::TournamentMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_xml() {
        let xml = "<scores tournament=\"t\"><bowler pid=\"1\"></scores>";
        assert!(matches!(parse_score_xml(xml.as_bytes(), "t"), Err(ImportError::Xml(_))));
        assert!(matches!(
            parse_score_xml(b"<other/>", "t"),
            Err(ImportError::Xml(_))
        ));
    }

    #[test]
    fn test_line_at() {
        assert_eq!(line_at("a\nb\nc", 0), 1);
        assert_eq!(line_at("a\nb\nc", 2), 2);
        assert_eq!(line_at("a\nb\nc", 100), 3);
    }
}
