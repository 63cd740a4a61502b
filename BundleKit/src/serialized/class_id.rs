//! Names of common class ids

/// Class id of `Mesh`
pub const MESH: i32 = 43;

const CLASS_NAMES: &[(i32, &str)] = &[
    (1, "GameObject"),
    (2, "Component"),
    (4, "Transform"),
    (8, "Behaviour"),
    (21, "Material"),
    (23, "MeshRenderer"),
    (25, "Renderer"),
    (28, "Texture2D"),
    (33, "MeshFilter"),
    (43, "Mesh"),
    (48, "Shader"),
    (49, "TextAsset"),
    (54, "Rigidbody"),
    (64, "MeshCollider"),
    (65, "BoxCollider"),
    (74, "AnimationClip"),
    (83, "AudioClip"),
    (90, "Avatar"),
    (91, "AnimatorController"),
    (95, "Animator"),
    (108, "Light"),
    (111, "Animation"),
    (114, "MonoBehaviour"),
    (115, "MonoScript"),
    (128, "Font"),
    (135, "SphereCollider"),
    (136, "CapsuleCollider"),
    (137, "SkinnedMeshRenderer"),
    (142, "AssetBundle"),
    (198, "ParticleSystem"),
    (199, "ParticleSystemRenderer"),
    (212, "SpriteRenderer"),
    (213, "Sprite"),
    (224, "RectTransform"),
    (687078895, "SpriteAtlas"),
];

/// Name of a class id, if it is one of the common classes.
#[must_use]
pub fn class_name(class_id: i32) -> Option<&'static str> {
    CLASS_NAMES
        .binary_search_by_key(&class_id, |&(id, _)| id)
        .ok()
        .map(|i| CLASS_NAMES[i].1)
}
