use crate::{
    image::Image,
    model::data::{face::keypoints::KEY_POINTS_LEN, Face, KeyPoints, Rect, TensorData},
    Error, Result,
};

const STRIDES: [usize; 3] = [8, 16, 32];
const SCORE_FLOOR: f32 = 0.9;
const IOU_LIMIT: f32 = 0.3;
const TOP_K: usize = 5000;
const PAD_MULTIPLE: u32 = 32;
// native map order is [right-eye, left-eye, nose, right-mouth, left-mouth]
const LANDMARK_ORDER: [usize; KEY_POINTS_LEN] = [1, 0, 2, 4, 3];

// face_detection_yunet_2023mar.onnx
pub struct DetectModel {
    session: ort::session::Session,
    input_name: String,
    input_size: (u32, u32),
}

impl DetectModel {
    #[tracing::instrument(name = "Initialize detection model", err)]
    pub fn new(onnx_path: std::path::PathBuf) -> Result<Self> {
        let session = super::start_session_from_file(onnx_path)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| Error::InvalidModelIOError("detection model declares no input".to_owned()))?;

        Ok(Self {
            session,
            input_name,
            input_size: (0, 0),
        })
    }

    /// Faces in frame coordinates, sorted by descending confidence.
    pub fn detect(&mut self, image: &Image) -> Result<Vec<Face>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let (data, padded) = padded_bgr_tensor(image);
        if self.input_size != padded {
            tracing::debug!("detector input resized to {}x{}", padded.0, padded.1);
            self.input_size = padded;
        }

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() =>
                ort::value::Tensor::from_array(data).map_err(Error::ModelError)?])
            .map_err(Error::ModelError)?;

        let plane = |name: String| -> Result<Vec<f32>> {
            Ok(outputs
                .get(name.as_str())
                .ok_or_else(|| Error::InvalidModelIOError(format!("missing detector output {name}")))?
                .try_extract_array::<f32>()
                .map_err(Error::ModelError)?
                .iter()
                .copied()
                .collect())
        };

        let mut candidates = Vec::new();
        for stride in STRIDES {
            let cols = padded.0 as usize / stride;
            let rows = padded.1 as usize / stride;
            let cells = cols * rows;

            let (cls, obj) = (plane(format!("cls_{stride}"))?, plane(format!("obj_{stride}"))?);
            let (bbox, kps) = (plane(format!("bbox_{stride}"))?, plane(format!("kps_{stride}"))?);
            if cls.len() < cells
                || obj.len() < cells
                || bbox.len() < cells * 4
                || kps.len() < cells * 2 * KEY_POINTS_LEN
            {
                return Err(Error::InvalidModelIOError(format!(
                    "detector stride {stride} outputs are undersized"
                )));
            }

            candidates.extend(decode_stride(stride, cols, rows, &cls, &obj, &bbox, &kps));
        }

        Ok(non_max_suppression(candidates)
            .into_iter()
            .filter_map(|candidate| {
                let [x1, y1, x2, y2] = candidate.corners;
                Rect::from_detection(x1, y1, x2 - x1, y2 - y1, width, height).map(|rect| Face {
                    score: candidate.score,
                    rect,
                    keypoints: KeyPoints(candidate.kps),
                })
            })
            .collect())
    }
}

impl super::Locator for DetectModel {
    fn locate(&mut self, image: &Image) -> Result<Vec<Face>> {
        self.detect(image)
    }
}

struct Candidate {
    corners: [f32; 4], // x1, y1, x2, y2
    kps: [[f32; 2]; KEY_POINTS_LEN],
    score: f32,
}

// BGR, f32 in [0, 255], zero-padded right/bottom to the next multiple of 32.
fn padded_bgr_tensor(image: &Image) -> (TensorData, (u32, u32)) {
    let (width, height) = image.dimensions();
    let padded = (
        width.div_ceil(PAD_MULTIPLE) * PAD_MULTIPLE,
        height.div_ceil(PAD_MULTIPLE) * PAD_MULTIPLE,
    );

    let mut data = TensorData::zeros((1, 3, padded.1 as usize, padded.0 as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let image::Rgb([r, g, b]) = *pixel;
        data[[0, 0, y as usize, x as usize]] = b as f32;
        data[[0, 1, y as usize, x as usize]] = g as f32;
        data[[0, 2, y as usize, x as usize]] = r as f32;
    }

    (data, padded)
}

// Callers guarantee the raw maps cover `rows * cols` cells; maps are
// row-major cells with per-cell channels.
fn decode_stride(
    stride: usize,
    cols: usize,
    rows: usize,
    cls: &[f32],
    obj: &[f32],
    bbox: &[f32],
    kps: &[f32],
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let cell = row * cols + col;
            let score = (cls[cell].clamp(0., 1.) * obj[cell].clamp(0., 1.)).sqrt();
            if score < SCORE_FLOOR {
                continue;
            }

            let scale = stride as f32;
            let center_x = (col as f32 + bbox[cell * 4]) * scale;
            let center_y = (row as f32 + bbox[cell * 4 + 1]) * scale;
            let box_w = bbox[cell * 4 + 2].exp() * scale;
            let box_h = bbox[cell * 4 + 3].exp() * scale;

            candidates.push(Candidate {
                corners: [
                    center_x - box_w / 2.,
                    center_y - box_h / 2.,
                    center_x + box_w / 2.,
                    center_y + box_h / 2.,
                ],
                kps: std::array::from_fn(|point| {
                    let native = LANDMARK_ORDER[point];
                    [
                        (col as f32 + kps[cell * 2 * KEY_POINTS_LEN + native * 2]) * scale,
                        (row as f32 + kps[cell * 2 * KEY_POINTS_LEN + native * 2 + 1]) * scale,
                    ]
                }),
                score,
            });
        }
    }
    candidates
}

// Greedy, on descending score.
fn non_max_suppression(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(TOP_K);

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| iou(&k.corners, &candidate.corners) < IOU_LIMIT) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let overlap_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.);
    let overlap_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.);
    let overlap = overlap_w * overlap_h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - overlap;
    match union {
        union if union > 0. => overlap / union,
        _ => 0.,
    }
}
