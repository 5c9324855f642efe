use seed::{prelude::*, *};
use serde::de::DeserializeOwned;
use shared::{
    Locale, MapMetadata, Segment, Selection, SelectionToken, TrackSummary, average_speed_kmh,
    format_distance, format_duration,
};
use wasm_bindgen::prelude::wasm_bindgen;

fn api_root() -> String {
    if let Some(url) = option_env!("FRONTEND_API_ROOT") {
        return url.trim_end_matches('/').to_string();
    }
    "http://localhost:8080".to_string()
}

pub struct Model {
    locale: Locale,
    hikes: Vec<TrackSummary>,
    listing: Listing,
    /// Summaries still in flight after the manifest arrived.
    pending_summaries: usize,
    selection: Selection<String>,
    map: MapState,
}

#[derive(Clone, Debug, PartialEq)]
enum Listing {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Clone, Debug)]
enum MapState {
    Idle,
    Loading,
    Ready(MapMetadata),
    Unavailable(String),
}

pub enum Msg {
    ManifestFetched(Result<Vec<String>, String>),
    SummaryFetched(Result<TrackSummary, String>),
    Select(String),
    MapFetched(SelectionToken, Result<MapMetadata, String>),
    ToggleLocale,
}

pub fn init(_: Url, orders: &mut impl Orders<Msg>) -> Model {
    let url = format!("{}/api/hikes", api_root());
    orders.perform_cmd(async move { Msg::ManifestFetched(fetch_json(url).await) });
    Model {
        locale: Locale::default(),
        hikes: Vec::new(),
        listing: Listing::Loading,
        pending_summaries: 0,
        selection: Selection::new(),
        map: MapState::Idle,
    }
}

pub fn update(msg: Msg, model: &mut Model, orders: &mut impl Orders<Msg>) {
    match msg {
        Msg::ManifestFetched(Ok(files)) => {
            web_sys::console::debug_1(
                &format!("[trailmap] manifest lists {} track(s)", files.len()).into(),
            );
            model.pending_summaries = files.len();
            if files.is_empty() {
                forget_hikes(model);
                model.listing = Listing::Ready;
            }
            for filename in files {
                let url = format!("{}/api/hikes/{filename}", api_root());
                orders.perform_cmd(async move { Msg::SummaryFetched(fetch_json(url).await) });
            }
        }
        Msg::ManifestFetched(Err(err)) => {
            forget_hikes(model);
            model.listing = Listing::Failed(err);
        }
        Msg::SummaryFetched(result) => {
            model.pending_summaries = model.pending_summaries.saturating_sub(1);
            match result {
                Ok(summary) => {
                    model.hikes.push(summary);
                    sort_most_recent_first(&mut model.hikes);
                }
                Err(err) => {
                    web_sys::console::error_1(&format!("[trailmap] summary failed: {err}").into());
                }
            }
            if model.pending_summaries == 0 {
                model.listing = Listing::Ready;
                if model.selection.current().is_none() {
                    if let Some(first) = model.hikes.first() {
                        orders.send_msg(Msg::Select(first.filename.clone()));
                    }
                }
            }
        }
        Msg::Select(filename) => {
            if model.selection.current() == Some(&filename) {
                return;
            }
            let token = model.selection.select(filename.clone());
            model.map = MapState::Loading;
            let url = format!("{}/api/hikes/{filename}/map", api_root());
            orders.perform_cmd(async move { Msg::MapFetched(token, fetch_json(url).await) });
        }
        Msg::MapFetched(token, result) => match model.selection.accept(token, result) {
            Some(Ok(metadata)) => model.map = MapState::Ready(metadata),
            Some(Err(err)) => model.map = MapState::Unavailable(err),
            None => {
                web_sys::console::debug_1(&"[trailmap] dropped stale map response".into());
            }
        },
        Msg::ToggleLocale => model.locale = model.locale.toggle(),
    }
}

/// Drop listed hikes and the selected map; a map load still in flight is ignored.
fn forget_hikes(model: &mut Model) {
    model.hikes.clear();
    model.selection.clear();
    model.map = MapState::Idle;
}

async fn fetch_json<T: DeserializeOwned + 'static>(url: String) -> Result<T, String> {
    match Request::new(url).method(Method::Get).fetch().await {
        Err(err) => Err(format!("{err:?}")),
        Ok(raw) => match raw.check_status() {
            Err(status_err) => Err(format!("{status_err:?}")),
            Ok(resp) => resp.json::<T>().await.map_err(|err| format!("{err:?}")),
        },
    }
}

fn sort_most_recent_first(hikes: &mut [TrackSummary]) {
    hikes.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}

pub fn view(model: &Model) -> Node<Msg> {
    let locale = model.locale;
    div![
        C!["hiking-page"],
        header![
            C!["hiking-header"],
            h1![locale.pick("Hiking log", "徒步记录")],
            button![
                C!["locale-toggle"],
                locale.pick("中文", "English"),
                ev(Ev::Click, |_| Msg::ToggleLocale),
            ],
        ],
        view_listing(model),
        view_selected(model),
    ]
}

fn view_listing(model: &Model) -> Node<Msg> {
    let locale = model.locale;
    match &model.listing {
        Listing::Loading => p![
            C!["loading"],
            locale.pick("Loading hikes...", "正在加载徒步记录...")
        ],
        Listing::Failed(err) => p![
            C!["error"],
            locale.pick("Could not load the hike list: ", "无法加载徒步列表："),
            err
        ],
        Listing::Ready if model.hikes.is_empty() => p![
            C!["empty"],
            locale.pick("No hikes recorded yet.", "暂无徒步记录。")
        ],
        Listing::Ready => ul![
            C!["hike-list"],
            model.hikes.iter().map(|hike| view_hike_card(hike, model)),
        ],
    }
}

fn view_hike_card(hike: &TrackSummary, model: &Model) -> Node<Msg> {
    let locale = model.locale;
    let selected = model.selection.current() == Some(&hike.filename);
    let filename = hike.filename.clone();
    let speed = average_speed_kmh(hike.distance, hike.duration)
        .map(|kmh| format!("{kmh:.1} km/h"))
        .unwrap_or_else(|| "N/A".to_string());
    let gain = hike
        .elevation_gain
        .map(|gain| format!("{gain:.0} m"))
        .unwrap_or_else(|| "N/A".to_string());

    li![
        C!["hike-card", IF!(selected => "selected")],
        h3![&hike.name],
        small![hike.start_time.format("%Y-%m-%d").to_string()],
        div![
            C!["metadata-grid"],
            stat(locale.pick("Distance", "距离"), format_distance(hike.distance)),
            stat(locale.pick("Duration", "用时"), format_duration(hike.duration, locale)),
            stat(locale.pick("Avg speed", "平均速度"), speed),
            stat(locale.pick("Elevation gain", "累计爬升"), gain),
        ],
        ev(Ev::Click, move |_| Msg::Select(filename.clone())),
    ]
}

fn stat(label: &str, content: String) -> Node<Msg> {
    div![
        C!["metadata-card"],
        span![C!["label"], label],
        strong![content],
    ]
}

fn view_selected(model: &Model) -> Node<Msg> {
    let locale = model.locale;
    let body = match (&model.map, model.selection.current()) {
        (_, None) => p![
            C!["empty"],
            locale.pick("Select a hike to see its map.", "选择一条记录查看地图。")
        ],
        (MapState::Idle | MapState::Loading, Some(_)) => {
            p![C!["loading"], locale.pick("Loading map...", "地图加载中...")]
        }
        (MapState::Unavailable(err), Some(_)) => p![
            C!["empty"],
            locale.pick("No map has been generated for this hike yet.", "该记录尚未生成地图。"),
            small![err],
        ],
        (MapState::Ready(metadata), Some(filename)) => view_map(metadata, filename),
    };
    section![C!["hike-map"], body]
}

fn view_map(metadata: &MapMetadata, filename: &str) -> Node<Msg> {
    let view_box = format!("0 0 {} {}", metadata.width, metadata.height);
    div![
        C!["map-frame"],
        img![attrs! {
            At::Src => raster_url(filename),
            At::Alt => &metadata.stats.name,
            At::Width => metadata.width.to_string(),
            At::Height => metadata.height.to_string(),
        }],
        svg![
            C!["track-overlay"],
            attrs! {
                At::ViewBox => view_box,
                At::from("preserveAspectRatio") => "none",
            },
            metadata
                .segments
                .iter()
                .map(|segment| view_segment(segment, metadata)),
        ],
    ]
}

fn view_segment(segment: &Segment, metadata: &MapMetadata) -> Node<Msg> {
    polyline![attrs! {
        At::from("points") => overlay_points(segment, metadata),
        At::Stroke => segment.color.css_color(),
        At::Fill => "none",
        At::StrokeWidth => "4",
        At::from("stroke-linecap") => "round",
        At::from("stroke-linejoin") => "round",
    }]
}

/// SVG `points` for a segment in raster pixel space.
fn overlay_points(segment: &Segment, metadata: &MapMetadata) -> String {
    segment
        .points
        .iter()
        .map(|[lat, lon]| {
            let (x, y) = metadata
                .bounds
                .project(*lat, *lon, metadata.width, metadata.height);
            format!("{x:.1},{y:.1}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn raster_url(filename: &str) -> String {
    let stem = filename.strip_suffix(".gpx").unwrap_or(filename);
    format!("{}/maps/{stem}.jpg", api_root())
}

#[wasm_bindgen(start)]
pub fn start() {
    App::start("app", init, update, view);
}
