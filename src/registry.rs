//! Static reference data: reciters, surahs, background keywords and the tag denylist.

use crate::models::{Reciter, Surah};
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub static RECITERS: &[Reciter] = &[
    Reciter { id: "abdul_basit", name_ar: "عبد الباسط عبد الصمد - مرتل", name_en: "Abdul Basit - Murattal", folder: "Abdul_Basit_Murattal_192kbps" },
    Reciter { id: "abdul_basit_murattal_192", name_ar: "عبد الباسط - مرتل 192", name_en: "Abdul Basit - Murattal 192kbps", folder: "Abdul_Basit_Murattal_192kbps" },
    Reciter { id: "abdul_basit_murattal_64", name_ar: "عبد الباسط - مرتل 64", name_en: "Abdul Basit - Murattal 64kbps", folder: "Abdul_Basit_Murattal_64kbps" },
    Reciter { id: "abdul_basit_mujawwad", name_ar: "عبد الباسط - مجود", name_en: "Abdul Basit - Mujawwad", folder: "Abdul_Basit_Mujawwad_128kbps" },
    Reciter { id: "alafasy_128", name_ar: "مشاري العفاسي", name_en: "Mishary Alafasy", folder: "Alafasy_128kbps" },
    Reciter { id: "alafasy_64", name_ar: "مشاري العفاسي 64", name_en: "Mishary Alafasy 64kbps", folder: "Alafasy_64kbps" },
    Reciter { id: "ghamadi", name_ar: "سعد الغامدي", name_en: "Saad Al-Ghamidi", folder: "Ghamadi_40kbps" },
    Reciter { id: "husary_128", name_ar: "محمود خليل الحصري", name_en: "Mahmoud Khalil Al-Husary", folder: "Husary_128kbps" },
    Reciter { id: "husary_64", name_ar: "محمود خليل الحصري 64", name_en: "Mahmoud Khalil Al-Husary 64kbps", folder: "Husary_64kbps" },
    Reciter { id: "husary_mujawwad_128", name_ar: "محمود خليل الحصري - مجود", name_en: "Al-Husary - Mujawwad", folder: "Husary_128kbps_Mujawwad" },
    Reciter { id: "husary_mujawwad_64", name_ar: "محمود خليل الحصري - مجود 64", name_en: "Al-Husary - Mujawwad 64kbps", folder: "Husary_Mujawwad_64kbps" },
    Reciter { id: "husary_muallim", name_ar: "محمود خليل الحصري - معلم", name_en: "Al-Husary - Teacher", folder: "Husary_Muallim_128kbps" },
    Reciter { id: "maher_128", name_ar: "ماهر المعيقلي", name_en: "Maher Al-Muaiqly", folder: "MaherAlMuaiqly128kbps" },
    Reciter { id: "maher_64", name_ar: "ماهر المعيقلي 64", name_en: "Maher Al-Muaiqly 64kbps", folder: "Maher_AlMuaiqly_64kbps" },
    Reciter { id: "sudais_192", name_ar: "عبد الرحمن السديس", name_en: "Abdul Rahman Al-Sudais", folder: "Abdurrahmaan_As-Sudais_192kbps" },
    Reciter { id: "sudais_64", name_ar: "عبد الرحمن السديس 64", name_en: "Abdul Rahman Al-Sudais 64kbps", folder: "Abdurrahmaan_As-Sudais_64kbps" },
    Reciter { id: "minshawi_murattal", name_ar: "محمد صديق المنشاوي - مرتل", name_en: "Al-Minshawi - Murattal", folder: "Minshawy_Murattal_128kbps" },
    Reciter { id: "minshawi_mujawwad_192", name_ar: "محمد صديق المنشاوي - مجود", name_en: "Al-Minshawi - Mujawwad", folder: "Minshawy_Mujawwad_192kbps" },
    Reciter { id: "minshawi_mujawwad_64", name_ar: "محمد صديق المنشاوي - مجود 64", name_en: "Al-Minshawi - Mujawwad 64kbps", folder: "Minshawy_Mujawwad_64kbps" },
    Reciter { id: "ajmi_128", name_ar: "أحمد العجمي", name_en: "Ahmed Al-Ajmi", folder: "Ahmed_ibn_Ali_al-Ajamy_128kbps_ketaballah.net" },
    Reciter { id: "ajmi_64", name_ar: "أحمد العجمي 64", name_en: "Ahmed Al-Ajmi 64kbps", folder: "Ahmed_ibn_Ali_al-Ajamy_64kbps_QuranExplorer.Com" },
    Reciter { id: "shuraim_128", name_ar: "سعود الشريم", name_en: "Saud Al-Shuraim", folder: "Shuraym_128kbps" },
    Reciter { id: "shuraim_64", name_ar: "سعود الشريم 64", name_en: "Saud Al-Shuraim 64kbps", folder: "Shuraym_64kbps" },
    Reciter { id: "juhany", name_ar: "عبد الله الجهني", name_en: "Abdullah Al-Juhany", folder: "Abdullaah_3awwaad_Al-Juhaynee_128kbps" },
    Reciter { id: "basfar_192", name_ar: "عبد الله بصفر", name_en: "Abdullah Basfar", folder: "Abdullah_Basfar_192kbps" },
    Reciter { id: "basfar_64", name_ar: "عبد الله بصفر 64", name_en: "Abdullah Basfar 64kbps", folder: "Abdullah_Basfar_64kbps" },
    Reciter { id: "basfar_32", name_ar: "عبد الله بصفر 32", name_en: "Abdullah Basfar 32kbps", folder: "Abdullah_Basfar_32kbps" },
    Reciter { id: "shatri_128", name_ar: "أبو بكر الشاطري", name_en: "Abu Bakr Al-Shatri", folder: "Abu_Bakr_Ash-Shaatree_128kbps" },
    Reciter { id: "shatri_64", name_ar: "أبو بكر الشاطري 64", name_en: "Abu Bakr Al-Shatri 64kbps", folder: "Abu_Bakr_Ash-Shaatree_64kbps" },
    Reciter { id: "ali_jaber", name_ar: "علي جابر", name_en: "Ali Jaber", folder: "Ali_Jaber_64kbps" },
    Reciter { id: "hudhaify_128", name_ar: "علي الحذيفي", name_en: "Ali Al-Hudhaify", folder: "Hudhaify_128kbps" },
    Reciter { id: "hudhaify_64", name_ar: "علي الحذيفي 64", name_en: "Ali Al-Hudhaify 64kbps", folder: "Hudhaify_64kbps" },
    Reciter { id: "hudhaify_32", name_ar: "علي الحذيفي 32", name_en: "Ali Al-Hudhaify 32kbps", folder: "Hudhaify_32kbps" },
    Reciter { id: "ayyub_128", name_ar: "محمد أيوب", name_en: "Muhammad Ayyub", folder: "Muhammad_Ayyoub_128kbps" },
    Reciter { id: "ayyub_64", name_ar: "محمد أيوب 64", name_en: "Muhammad Ayyub 64kbps", folder: "Muhammad_Ayyoub_64kbps" },
    Reciter { id: "ayyub_32", name_ar: "محمد أيوب 32", name_en: "Muhammad Ayyub 32kbps", folder: "Muhammad_Ayyoub_32kbps" },
    Reciter { id: "jibreel_128", name_ar: "محمد جبريل", name_en: "Muhammad Jibreel", folder: "Muhammad_Jibreel_128kbps" },
    Reciter { id: "jibreel_64", name_ar: "محمد جبريل 64", name_en: "Muhammad Jibreel 64kbps", folder: "Muhammad_Jibreel_64kbps" },
    Reciter { id: "qatami", name_ar: "ناصر القطامي", name_en: "Nasser Al-Qatami", folder: "Nasser_Alqatami_128kbps" },
    Reciter { id: "dosari", name_ar: "ياسر الدوسري", name_en: "Yasser Al-Dosari", folder: "Dussary_128kbps" },
    Reciter { id: "tablawi_128", name_ar: "محمد الطبلاوي", name_en: "Muhammad Al-Tablawi", folder: "Mohammad_al_Tablaway_128kbps" },
    Reciter { id: "tablawi_64", name_ar: "محمد الطبلاوي 64", name_en: "Muhammad Al-Tablawi 64kbps", folder: "Mohammad_al_Tablaway_64kbps" },
    Reciter { id: "bandar_baleela", name_ar: "بندر بليلة", name_en: "Bandar Baleela", folder: "Bandar_Baleela_64kbps" },
    Reciter { id: "ahmed_neana", name_ar: "أحمد نعينع", name_en: "Ahmed Neana", folder: "Ahmed_Neana_128kbps" },
    Reciter { id: "ibrahim_akhdar_64", name_ar: "إبراهيم الأخضر", name_en: "Ibrahim Akhdar", folder: "Ibrahim_Akhdar_64kbps" },
    Reciter { id: "ibrahim_akhdar_32", name_ar: "إبراهيم الأخضر 32", name_en: "Ibrahim Akhdar 32kbps", folder: "Ibrahim_Akhdar_32kbps" },
    Reciter { id: "qahtani", name_ar: "خالد القحطاني", name_en: "Khalid Al-Qahtani", folder: "Khaalid_Abdullaah_al-Qahtaanee_192kbps" },
    Reciter { id: "hani_rifai_192", name_ar: "هاني الرفاعي", name_en: "Hani Rifai", folder: "Hani_Rifai_192kbps" },
    Reciter { id: "hani_rifai_64", name_ar: "هاني الرفاعي 64", name_en: "Hani Rifai 64kbps", folder: "Hani_Rifai_64kbps" },
    Reciter { id: "muhsin_qasim", name_ar: "محسن القاسم", name_en: "Muhsin Al-Qasim", folder: "Muhsin_Al_Qasim_192kbps" },
    Reciter { id: "salah_budair", name_ar: "صلاح البدير", name_en: "Salah Al-Budair", folder: "Salah_Al_Budair_128kbps" },
    Reciter { id: "salah_bukhatir", name_ar: "صلاح بوخاطر", name_en: "Salah Bukhatir", folder: "Salaah_AbdulRahman_Bukhatir_128kbps" },
    Reciter { id: "abdullah_matroud", name_ar: "عبد الله مطرود", name_en: "Abdullah Matroud", folder: "Abdullah_Matroud_128kbps" },
    Reciter { id: "akram_alaqimy", name_ar: "أكرم العلاقمي", name_en: "Akram AlAlaqimy", folder: "Akram_AlAlaqimy_128kbps" },
    Reciter { id: "ali_hajjaj", name_ar: "علي حجاج السويسي", name_en: "Ali Hajjaj AlSuesy", folder: "Ali_Hajjaj_AlSuesy_128kbps" },
    Reciter { id: "ayman_sowaid", name_ar: "أيمن سويد", name_en: "Ayman Sowaid", folder: "Ayman_Sowaid_64kbps" },
    Reciter { id: "fares_abbad", name_ar: "فارس عباد", name_en: "Fares Abbad", folder: "Fares_Abbad_64kbps" },
    Reciter { id: "khalefa_tunaiji", name_ar: "خليفة الطنيجي", name_en: "Khalefa Al-Tunaiji", folder: "khalefa_al_tunaiji_64kbps" },
    Reciter { id: "mahmoud_banna", name_ar: "محمود علي البنا", name_en: "Mahmoud Ali Al-Banna", folder: "mahmoud_ali_al_banna_32kbps" },
    Reciter { id: "muhammad_abdulkareem", name_ar: "محمد عبد الكريم", name_en: "Muhammad AbdulKareem", folder: "Muhammad_AbdulKareem_128kbps" },
    Reciter { id: "mustafa_ismail", name_ar: "مصطفى إسماعيل", name_en: "Mustafa Ismail", folder: "Mustafa_Ismail_48kbps" },
    Reciter { id: "nabil_rifai", name_ar: "نبيل الرفاعي", name_en: "Nabil Rifai", folder: "Nabil_Rifa3i_48kbps" },
    Reciter { id: "sahl_yassin", name_ar: "سهل ياسين", name_en: "Sahl Yassin", folder: "Sahl_Yassin_128kbps" },
    Reciter { id: "yaser_salamah", name_ar: "ياسر سلامة", name_en: "Yaser Salamah", folder: "Yaser_Salamah_128kbps" },
    Reciter { id: "karim_mansoori", name_ar: "كريم منصوري", name_en: "Karim Mansoori", folder: "Karim_Mansoori_40kbps" },
    Reciter { id: "parhizgar", name_ar: "برهيزجار", name_en: "Parhizgar", folder: "Parhizgar_48kbps" },
];

static SURAH_NAMES: [&str; 114] = [
    "الفاتحة", "البقرة", "آل عمران", "النساء", "المائدة", "الأنعام",
    "الأعراف", "الأنفال", "التوبة", "يونس", "هود", "يوسف",
    "الرعد", "إبراهيم", "الحجر", "النحل", "الإسراء", "الكهف",
    "مريم", "طه", "الأنبياء", "الحج", "المؤمنون", "النور",
    "الفرقان", "الشعراء", "النمل", "القصص", "العنكبوت", "الروم",
    "لقمان", "السجدة", "الأحزاب", "سبأ", "فاطر", "يس",
    "الصافات", "ص", "الزمر", "غافر", "فصلت", "الشورى",
    "الزخرف", "الدخان", "الجاثية", "الأحقاف", "محمد", "الفتح",
    "الحجرات", "ق", "الذاريات", "الطور", "النجم", "القمر",
    "الرحمن", "الواقعة", "الحديد", "المجادلة", "الحشر", "الممتحنة",
    "الصف", "الجمعة", "المنافقون", "التغابن", "الطلاق", "التحريم",
    "الملك", "القلم", "الحاقة", "المعارج", "نوح", "الجن",
    "المزمل", "المدثر", "القيامة", "الإنسان", "المرسلات", "النبأ",
    "النازعات", "عبس", "التكوير", "الإنفطار", "المطففين", "الإنشقاق",
    "البروج", "الطارق", "الأعلى", "الغاشية", "الفجر", "البلد",
    "الشمس", "الليل", "الضحى", "الشرح", "التين", "العلق",
    "القدر", "البينة", "الزلزلة", "العاديات", "القارعة", "التكاثر",
    "العصر", "الهمزة", "الفيل", "قريش", "الماعون", "الكوثر",
    "الكافرون", "النصر", "المسد", "الإخلاص", "الفلق", "الناس",
];

pub const SEARCH_KEYWORDS: &[&str] = &[
    "mosque architecture",
    "islamic mosque dome",
    "masjid minaret",
    "clouds sky timelapse",
    "sunset clouds",
    "night sky stars",
    "milky way galaxy",
    "mountain landscape",
    "mountain peak aerial",
    "ocean waves",
    "waterfall flowing",
    "desert sand dunes",
];

/// Used once per attempt when a keyword search comes back empty.
pub const FALLBACK_KEYWORD: &str = "mountain landscape";

/// Lower-case substrings that reject a candidate when found in its tags or page URL.
pub const DENYLIST: &[&str] = &[
    // people
    "people", "person", "man", "woman", "child", "human", "face", "portrait",
    "crowd", "group", "boy", "girl", "baby", "adult", "hand", "hands",
    "walking", "running", "standing", "sitting", "talking", "dancing",
    // animals
    "animal", "dog", "cat", "bird", "fish", "horse", "cow", "sheep",
    "lion", "tiger", "elephant", "monkey", "bear", "deer", "rabbit",
    "chicken", "duck", "goose", "eagle", "pigeon", "butterfly", "bee",
    "insect", "spider", "snake", "lizard", "frog", "wildlife", "pet",
    "camel", "goat", "donkey", "buffalo",
    // non-islamic religious sites
    "church", "cathedral", "chapel", "temple", "synagogue", "pagoda",
    "shrine", "monastery", "convent", "cross", "crucifix", "buddha",
    "hindu", "christian", "jesus", "christ", "mary", "saint",
    // nightlife
    "party", "club", "bar", "alcohol", "wine", "beer", "dance", "concert",
    "festival", "celebration", "wedding", "bride", "groom",
];

static VERSE_COUNTS: [u16; 114] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98,
    135, 112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88,
    75, 85, 54, 53, 89, 59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29,
    22, 24, 13, 14, 11, 11, 18, 12, 12, 30, 52, 52, 44, 28, 28, 20, 56, 40, 31,
    50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26, 30, 20, 15, 21, 11, 8, 8,
    19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

static RECITER_INDEX: Lazy<HashMap<&'static str, &'static Reciter>> =
    Lazy::new(|| RECITERS.iter().map(|r| (r.id, r)).collect());

static SURAHS: Lazy<Vec<Surah>> = Lazy::new(|| {
    SURAH_NAMES
        .iter()
        .zip(1u16..)
        .map(|(&name, number)| Surah { number, name })
        .collect()
});

pub fn reciter(id: &str) -> Option<&'static Reciter> {
    RECITER_INDEX.get(id).copied()
}

pub fn surah(number: u16) -> Option<&'static Surah> {
    if number == 0 {
        return None;
    }
    SURAHS.get(usize::from(number) - 1)
}

pub fn surah_name(number: u16) -> &'static str {
    surah(number).map(|s| s.name).unwrap_or("")
}

/// Number of verses in a surah, `None` outside 1..=114.
pub fn verse_count(number: u16) -> Option<u16> {
    if number == 0 {
        return None;
    }
    VERSE_COUNTS.get(usize::from(number) - 1).copied()
}

pub fn list_reciters() -> &'static [Reciter] {
    RECITERS
}

pub fn list_surahs() -> &'static [Surah] {
    SURAHS.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_sizes() {
        assert_eq!(list_surahs().len(), 114);
        assert_eq!(VERSE_COUNTS.iter().map(|&v| u32::from(v)).sum::<u32>(), 6236);
        assert!(list_reciters().len() > 60);
    }

    #[test]
    fn test_reciter_lookup() {
        let r = reciter("abdul_basit").unwrap();
        assert_eq!(r.folder, "Abdul_Basit_Murattal_192kbps");
        assert_eq!(r.name_en, "Abdul Basit - Murattal");
        assert!(reciter("nobody").is_none());
    }

    #[test]
    fn test_reciter_ids_unique() {
        assert_eq!(RECITER_INDEX.len(), RECITERS.len());
    }

    #[test]
    fn test_surah_bounds() {
        assert_eq!(surah(1).unwrap().name, "الفاتحة");
        assert_eq!(surah(114).unwrap().name, "الناس");
        assert!(surah(0).is_none());
        assert!(surah(115).is_none());
        assert_eq!(verse_count(1), Some(7));
        assert_eq!(verse_count(2), Some(286));
        assert_eq!(verse_count(115), None);
    }

    #[test]
    fn test_denylist_is_lowercase() {
        assert!(DENYLIST.iter().all(|w| w.chars().all(|c| !c.is_uppercase())));
    }
}
