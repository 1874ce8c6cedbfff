pub use blend::{composite, BlendMode};
pub use diagnostics::Diagnostics;
pub use history::History;
pub use source::SourceFace;

pub mod blend;
pub mod diagnostics;
pub mod history;
pub mod mask;
pub mod source;

use crate::{
    image::Image,
    model::{
        data::{Face, KeyPoints, Rect},
        DetectModel, EmbedModel, Locator, Models, SwapModel,
    },
    setting::PipelineConfig,
    Error, Result,
};

/// Canonical alignment resolution for crops fed into the neural stages.
pub const ALIGN_SIZE: u32 = 512;

/// How a replacement face was produced, or that it could not be.
#[derive(Debug)]
pub enum SwapOutcome {
    /// Model-based synthesis from the aligned target and the source identity.
    Synthesized(Image),
    /// Geometric 3-point affine warp of the raw source crop.
    Fallback(Image),
    /// Neither strategy applied; the face stays untouched this frame.
    Skipped,
}

/// Drives one frame at a time through detection, per-face synthesis and
/// compositing. One face failing never aborts the rest of the frame.
pub struct SwapPipeline<D = DetectModel> {
    models: Models<D>,
    config: PipelineConfig,
    source: Option<SourceFace>,
    /// One history per detection slot. See `History` for the ordering caveat.
    histories: Vec<History>,
    diagnostics: Diagnostics,
}

impl<D: Locator> SwapPipeline<D> {
    pub fn new(models: Models<D>, config: PipelineConfig) -> Self {
        Self {
            models,
            config,
            source: None,
            histories: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn source(&self) -> Option<&SourceFace> {
        self.source.as_ref()
    }

    /// Captures a new source identity from a portrait. The aligned crop and
    /// the embedding are best-effort; a detected face with usable landmarks
    /// is the only hard requirement.
    #[tracing::instrument(name = "Register source face", skip_all, err)]
    pub fn register_source_face(&mut self, image: Image) -> Result<()> {
        let faces = self.models.detect.locate(&image)?;
        let face = faces
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| Error::NoSourceFaceError("no face detected".to_owned()))?;
        if !face.keypoints.is_finite() {
            return Err(Error::NoSourceFaceError(
                "landmark extraction failed".to_owned(),
            ));
        }

        let aligned = align(&image, &face.keypoints, &face.rect, ALIGN_SIZE);
        let embedding = match (self.models.embed.as_mut(), aligned.as_ref()) {
            (Some(model), Some(crop)) => match model.run(crop) {
                Ok(embedding) => Some(embedding),
                Err(err) => {
                    tracing::warn!("source embedding unavailable, model swaps disabled: {err}");
                    None
                }
            },
            _ => None,
        };

        // the new identity starts from a clean temporal state
        self.histories.clear();
        self.diagnostics.reset();
        self.source = Some(SourceFace {
            image,
            rect: face.rect,
            keypoints: face.keypoints,
            aligned,
            embedding,
        });
        Ok(())
    }

    /// Replaces every detected face in `frame` with the registered source
    /// identity, in place. Returns the raw detection count, which is
    /// independent of how many faces were actually composited.
    pub fn process_frame(&mut self, frame: &mut Image) -> Result<usize> {
        let Self {
            models,
            config,
            source,
            histories,
            diagnostics,
        } = self;
        let Some(source) = source.as_ref() else {
            return Ok(0);
        };

        // detection and alignment read the working copy; compositing always
        // writes into the original frame
        let working = match config.enhance_contrast {
            true => frame.equalize_contrast(),
            false => frame.clone(),
        };
        let faces = models.detect.locate(&working)?;

        for (slot, face) in faces.iter().enumerate() {
            if histories.len() <= slot {
                histories.push(History::new());
            }
            let composited = process_face(
                models,
                config,
                source,
                &mut histories[slot],
                diagnostics,
                &working,
                face,
                frame,
            );
            if !composited {
                tracing::debug!(slot, "face skipped this frame");
            }
        }

        Ok(faces.len())
    }
}

/// Canonical-pose crop of `rect` at `size` x `size`. `None` when the
/// landmarks are unusable or the similarity fit degenerates.
pub fn align(image: &Image, keypoints: &KeyPoints, rect: &Rect, size: u32) -> Option<Image> {
    if !keypoints.is_finite() {
        return None;
    }
    let relative = keypoints.shift_relative(rect.x as f32, rect.y as f32);
    let transform = relative.umeyama_to_canonical(size)?;
    rect.crop_from(image).warp_into_new(&transform, size, size)
}

#[allow(clippy::too_many_arguments)]
fn process_face<D>(
    models: &mut Models<D>,
    config: &PipelineConfig,
    source: &SourceFace,
    history: &mut History,
    diagnostics: &mut Diagnostics,
    working: &Image,
    face: &Face,
    frame: &mut Image,
) -> bool {
    let aligned_target = align(working, &face.keypoints, &face.rect, ALIGN_SIZE);

    trace_identity_similarity(
        models.embed.as_mut(),
        diagnostics,
        aligned_target.as_ref(),
        source,
    );

    let mut swapped = match synthesize(
        models.swap.as_mut(),
        diagnostics,
        source,
        aligned_target.as_ref(),
        face,
    ) {
        SwapOutcome::Synthesized(image) | SwapOutcome::Fallback(image) => image,
        SwapOutcome::Skipped => return false,
    };

    if config.enable_restoration {
        if let Some(model) = models.restore.as_mut() {
            match model.run(&swapped) {
                Ok(restored) => swapped = restored,
                // restoration never costs a face
                Err(err) => {
                    diagnostics.warn_restore_failure(&err);
                }
            }
        }
    }

    let relative = face
        .keypoints
        .shift_relative(face.rect.x as f32, face.rect.y as f32);

    if config.enable_stabilization {
        swapped = history.stabilize(&swapped, config.stabilization_strength);
        history.push(history::Entry {
            face: swapped.clone(),
            keypoints: relative.clone(),
        });
    }

    let mask_points = relative.is_finite().then_some(&relative);
    let mask = mask::build_mask(face.rect.width, face.rect.height, mask_points);
    composite(
        frame,
        &face.rect,
        &swapped,
        &mask,
        config.blend_mode,
        config.blend_strength,
    );
    true
}

// Target identity is only ever observed as a similarity trace; it never
// changes pixel output.
fn trace_identity_similarity(
    embed: Option<&mut EmbedModel>,
    diagnostics: &mut Diagnostics,
    aligned_target: Option<&Image>,
    source: &SourceFace,
) {
    let (Some(model), Some(aligned), Some(source_embedding)) =
        (embed, aligned_target, source.embedding.as_ref())
    else {
        return;
    };
    match model.run(aligned) {
        Ok(target) => {
            tracing::debug!(
                similarity = target.dot(source_embedding),
                "target identity similarity"
            );
        }
        Err(err) => {
            diagnostics.warn_embed_failure(&err);
        }
    }
}

/// First success wins: model swap, then the geometric fallback. The fallback
/// never needs the embedding or the swap model, so the pipeline degrades to
/// pure geometry when neural assets are missing.
fn synthesize(
    swap: Option<&mut SwapModel>,
    diagnostics: &mut Diagnostics,
    source: &SourceFace,
    aligned_target: Option<&Image>,
    target: &Face,
) -> SwapOutcome {
    if let (Some(model), Some(embedding), Some(aligned)) =
        (swap, source.embedding.as_ref(), aligned_target)
    {
        match model.run(aligned, embedding) {
            Ok(tensor) => return SwapOutcome::Synthesized(tensor.to_image()),
            Err(err) => {
                diagnostics.warn_swap_fallback(&err);
            }
        }
    }

    geometric_fallback(source, target)
}

fn geometric_fallback(source: &SourceFace, target: &Face) -> SwapOutcome {
    let src = source
        .keypoints
        .shift_relative(source.rect.x as f32, source.rect.y as f32)
        .anchor_triangle();
    let dst = target
        .keypoints
        .shift_relative(target.rect.x as f32, target.rect.y as f32)
        .anchor_triangle();
    if !anchors_within(&src, &source.rect) || !anchors_within(&dst, &target.rect) {
        return SwapOutcome::Skipped;
    }

    let Some(transform) = KeyPoints::three_point_affine(src, dst) else {
        return SwapOutcome::Skipped;
    };
    match source
        .crop()
        .warp_into_new(&transform, target.rect.width, target.rect.height)
    {
        Some(warped) => SwapOutcome::Fallback(warped),
        None => SwapOutcome::Skipped,
    }
}

// Inclusive: a point on the far edge of the rect still counts as inside.
fn anchors_within(points: &[[f32; 2]; 3], rect: &Rect) -> bool {
    points.iter().all(|[x, y]| {
        x.is_finite()
            && y.is_finite()
            && (0. ..=rect.width as f32).contains(x)
            && (0. ..=rect.height as f32).contains(y)
    })
}

#[cfg(test)]
mod test {
    use image::{Rgb, RgbImage};

    use super::*;

    struct ScriptedLocator {
        responses: std::collections::VecDeque<Vec<Face>>,
    }

    impl Locator for ScriptedLocator {
        fn locate(&mut self, _: &Image) -> Result<Vec<Face>> {
            Ok(self.responses.pop_front().unwrap_or_default())
        }
    }

    fn pipeline(
        responses: Vec<Vec<Face>>,
        config: PipelineConfig,
    ) -> SwapPipeline<ScriptedLocator> {
        SwapPipeline::new(
            Models {
                detect: ScriptedLocator {
                    responses: responses.into(),
                },
                embed: None,
                swap: None,
                restore: None,
            },
            config,
        )
    }

    fn flat(width: u32, height: u32, value: [u8; 3]) -> Image {
        Image::from(RgbImage::from_pixel(width, height, Rgb(value)))
    }

    // 60x60 box with eyes, nose and mouth laid out like a frontal face.
    fn face_at(x: u32, y: u32) -> Face {
        Face {
            score: 0.95,
            rect: Rect {
                x,
                y,
                width: 60,
                height: 60,
            },
            keypoints: KeyPoints([
                [x as f32 + 18., y as f32 + 24.],
                [x as f32 + 42., y as f32 + 24.],
                [x as f32 + 30., y as f32 + 38.],
                [x as f32 + 21., y as f32 + 48.],
                [x as f32 + 39., y as f32 + 48.],
            ]),
        }
    }

    fn source_face(face: &Face, image: Image) -> SourceFace {
        SourceFace {
            image,
            rect: face.rect,
            keypoints: face.keypoints.clone(),
            aligned: None,
            embedding: None,
        }
    }

    #[test]
    fn registration_without_a_face_fails_and_frames_pass_through() {
        let mut pipeline = pipeline(vec![vec![]], PipelineConfig::default());

        let err = pipeline
            .register_source_face(flat(100, 100, [90; 3]))
            .unwrap_err();
        assert!(matches!(err, Error::NoSourceFaceError(_)));
        assert!(pipeline.source().is_none());

        let mut frame = flat(120, 120, [100; 3]);
        let untouched = frame.clone();

        assert_eq!(pipeline.process_frame(&mut frame).unwrap(), 0);
        assert_eq!(frame, untouched);
    }

    #[test]
    fn registration_rejects_unusable_landmarks() {
        let mut broken = face_at(20, 20);
        broken.keypoints = KeyPoints([[f32::NAN; 2]; 5]);
        let mut pipeline = pipeline(vec![vec![broken]], PipelineConfig::default());

        let err = pipeline
            .register_source_face(flat(100, 100, [90; 3]))
            .unwrap_err();

        match err {
            Error::NoSourceFaceError(reason) => assert!(reason.contains("landmark")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn registration_picks_the_highest_scoring_face() {
        let mut weak = face_at(10, 10);
        weak.score = 0.91;
        let strong = face_at(40, 40);
        let mut pipeline = pipeline(vec![vec![weak, strong.clone()]], PipelineConfig::default());

        pipeline
            .register_source_face(flat(120, 120, [90; 3]))
            .unwrap();

        assert_eq!(pipeline.source().unwrap().rect, strong.rect);
    }

    #[test]
    fn frame_without_models_swaps_through_the_geometric_fallback() {
        let mut pipeline = pipeline(
            vec![vec![face_at(20, 20)], vec![face_at(30, 30)]],
            PipelineConfig::default(),
        );
        pipeline
            .register_source_face(flat(100, 100, [200, 40, 40]))
            .unwrap();

        let mut frame = flat(120, 120, [100; 3]);
        let count = pipeline.process_frame(&mut frame).unwrap();

        assert_eq!(count, 1);
        // the rect center picked up the source color through the mask
        let center = frame.get_pixel(60, 60);
        assert!(center.0[0] > 150, "red channel stayed at {}", center.0[0]);
        assert!(center.0[1] < 90, "green channel stayed at {}", center.0[1]);
        // outside the rect stays untouched
        assert_eq!(frame.get_pixel(5, 5).0, [100; 3]);
        assert_eq!(frame.get_pixel(115, 115).0, [100; 3]);
    }

    #[test]
    fn one_broken_face_does_not_abort_the_others() {
        let mut broken = face_at(10, 10);
        broken.keypoints = KeyPoints([[f32::NAN; 2]; 5]);
        let working = face_at(70, 70);
        let mut pipeline = pipeline(
            vec![vec![face_at(20, 20)], vec![broken, working]],
            PipelineConfig::default(),
        );
        pipeline
            .register_source_face(flat(100, 100, [200, 40, 40]))
            .unwrap();

        let mut frame = flat(140, 140, [100; 3]);
        let count = pipeline.process_frame(&mut frame).unwrap();

        // raw detection count, not the composited count
        assert_eq!(count, 2);
        assert_eq!(frame.get_pixel(40, 40).0, [100; 3]);
        assert!(frame.get_pixel(100, 100).0[0] > 150);
    }

    #[test]
    fn stabilization_settles_on_repeated_identical_frames() {
        let mut responses = vec![vec![face_at(20, 20)]];
        responses.extend(std::iter::repeat(vec![face_at(30, 30)]).take(15));
        let mut pipeline = pipeline(responses, PipelineConfig::default());
        pipeline
            .register_source_face(flat(100, 100, [240, 240, 240]))
            .unwrap();

        let base = flat(120, 120, [100; 3]);
        let mut centers = Vec::new();
        for _ in 0..15 {
            let mut frame = base.clone();
            pipeline.process_frame(&mut frame).unwrap();
            centers.push(frame.get_pixel(60, 60).0[0]);
        }

        // weighted average at strength 0.7 with a full history has the fixed
        // point 0.3 * 240 / (1 - 5 * 0.7 / 6) = 172.8
        let tail = &centers[10..];
        let (min, max) = (tail.iter().min().unwrap(), tail.iter().max().unwrap());
        assert!(max - min <= 1, "still oscillating: {tail:?}");
        assert!(
            tail.iter().all(|&v| (v as f32 - 172.8).abs() < 2.),
            "settled off the fixed point: {tail:?}"
        );
    }

    #[test]
    fn disabled_stabilization_keeps_history_empty() {
        let config = PipelineConfig {
            enable_stabilization: false,
            ..PipelineConfig::default()
        };
        let mut pipeline = pipeline(
            vec![vec![face_at(20, 20)], vec![face_at(30, 30)]],
            config,
        );
        pipeline
            .register_source_face(flat(100, 100, [200, 40, 40]))
            .unwrap();

        let mut frame = flat(120, 120, [100; 3]);
        pipeline.process_frame(&mut frame).unwrap();

        assert!(pipeline.histories.iter().all(History::is_empty));
        assert!(frame.get_pixel(60, 60).0[0] > 150);
    }

    #[test]
    fn re_registration_drops_the_previous_temporal_state() {
        let mut pipeline = pipeline(
            vec![
                vec![face_at(20, 20)],
                vec![face_at(30, 30)],
                vec![face_at(20, 20)],
            ],
            PipelineConfig::default(),
        );
        pipeline
            .register_source_face(flat(100, 100, [200, 40, 40]))
            .unwrap();
        let mut frame = flat(120, 120, [100; 3]);
        pipeline.process_frame(&mut frame).unwrap();
        assert!(!pipeline.histories[0].is_empty());

        pipeline
            .register_source_face(flat(100, 100, [40, 200, 40]))
            .unwrap();

        assert!(pipeline.histories.is_empty());
    }

    #[test]
    fn alignment_produces_the_exact_canonical_size() {
        let face = face_at(20, 20);
        let image = flat(100, 100, [90; 3]);

        let aligned = align(&image, &face.keypoints, &face.rect, 512).unwrap();
        assert_eq!(aligned.dimensions(), (512, 512));

        let mut degenerate = face.keypoints.clone();
        degenerate.0 = [[30., 30.]; 5];
        assert!(align(&image, &degenerate, &face.rect, 512).is_none());
    }

    #[test]
    fn fallback_rejects_anchors_outside_their_rect() {
        let source_detection = face_at(20, 20);
        let source = source_face(&source_detection, flat(100, 100, [200, 40, 40]));

        let mut target = face_at(30, 30);
        // nose pushed past the rect's far edge
        target.keypoints.0[2] = [30. + 75., 30. + 38.];

        assert!(matches!(
            geometric_fallback(&source, &target),
            SwapOutcome::Skipped
        ));
    }

    #[test]
    fn fallback_rejects_collinear_anchors() {
        let source_detection = face_at(20, 20);
        let mut source = source_face(&source_detection, flat(100, 100, [200, 40, 40]));
        source.keypoints.0[0] = [20. + 10., 20. + 10.];
        source.keypoints.0[1] = [20. + 20., 20. + 20.];
        source.keypoints.0[2] = [20. + 30., 20. + 30.];

        assert!(matches!(
            geometric_fallback(&source, &face_at(30, 30)),
            SwapOutcome::Skipped
        ));
    }

    #[test]
    fn fallback_warp_matches_the_target_rect_size() {
        let source = source_face(&face_at(20, 20), flat(100, 100, [200, 40, 40]));
        let mut target = face_at(30, 30);
        target.rect.width = 44;
        target.rect.height = 52;
        // keep the anchors inside the shrunken rect
        target.keypoints = KeyPoints([
            [30. + 12., 30. + 18.],
            [30. + 32., 30. + 18.],
            [30. + 22., 30. + 30.],
            [30. + 15., 30. + 40.],
            [30. + 29., 30. + 40.],
        ]);

        match geometric_fallback(&source, &target) {
            SwapOutcome::Fallback(warped) => assert_eq!(warped.dimensions(), (44, 52)),
            other => panic!("expected a fallback warp, got {other:?}"),
        }
    }
}
